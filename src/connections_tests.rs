#[cfg(test)]
mod tests {
    use crate::connections::{ConnectionFetcher, ConnectionsGroup};
    use crate::datasource::{IsolationLevel, Statement};
    use crate::db_group::PhysicsDBGroup;
    use crate::error::{ConfigError, DaoError};
    use crate::test_support::Mock;
    use pretty_assertions::assert_eq;

    fn group(mock: &Mock) -> PhysicsDBGroup {
        PhysicsDBGroup::new("default", mock.service("master")).with_slave(mock.service("slave"))
    }

    #[test]
    fn fetcher_picks_master_or_slave() {
        let mock = Mock::new();
        let g = group(&mock);

        assert_eq!(ConnectionFetcher::DelayedRead.pick(&g).unwrap().name(), "slave");
        assert_eq!(ConnectionFetcher::NoDelayRead.pick(&g).unwrap().name(), "master");
        let write = ConnectionFetcher::Write { auto_commit: true };
        assert_eq!(write.pick(&g).unwrap().name(), "master");
        assert!(write.is_write());
        assert!(!ConnectionFetcher::DelayedRead.is_write());

        g.slave().unwrap().set_available(false);
        assert_eq!(ConnectionFetcher::DelayedRead.pick(&g).unwrap().name(), "master");

        g.master().set_available(false);
        assert_eq!(
            write.pick(&g).map(|_| ()),
            Err(ConfigError::MasterUnavailable("default".to_string()))
        );
        let single = PhysicsDBGroup::new("single", mock.service("only"));
        assert_eq!(ConnectionFetcher::DelayedRead.pick(&single).unwrap().name(), "only");
    }

    #[test]
    fn connections_are_lazy_and_cached_per_group() {
        let mock = Mock::new();
        let g = group(&mock);
        let other = PhysicsDBGroup::new("other", mock.service("o"));
        let mut cg = ConnectionsGroup::new(ConnectionFetcher::Write { auto_commit: false });
        assert!(cg.is_empty());
        assert!(mock.events().is_empty());

        cg.get_connection(&g).unwrap().query(&Statement::new("select 1", Vec::new())).unwrap();
        cg.get_connection(&g).unwrap();
        cg.get_connection(&other).unwrap();
        assert_eq!(cg.len(), 2);
        assert_eq!(
            mock.events(),
            vec!["master:open", "master:auto_commit=false", "o:open", "o:auto_commit=false"]
        );
        assert_eq!(mock.executed(), vec![("master".to_string(), Statement::new("select 1", Vec::new()))]);

        assert!(cg.close().is_empty());
        assert!(cg.is_closed());
        assert!(cg.close().is_empty());
        let closes = mock.events().iter().filter(|e| e.ends_with(":close")).count();
        assert_eq!(closes, 2);

        assert!(matches!(cg.get_connection(&g), Err(DaoError::Execution(_))));
    }

    #[test]
    fn read_fetchers_leave_auto_commit_alone() {
        let mock = Mock::new();
        let g = group(&mock);
        let mut cg = ConnectionsGroup::new(ConnectionFetcher::DelayedRead);
        cg.get_connection(&g).unwrap();
        assert_eq!(mock.events(), vec!["slave:open"]);
    }

    #[test]
    fn acquire_failure_is_reported() {
        let mock = Mock::new();
        mock.fail_connect("master");
        let g = group(&mock);
        let mut cg = ConnectionsGroup::new(ConnectionFetcher::NoDelayRead);
        assert!(matches!(cg.get_connection(&g), Err(DaoError::Execution(_))));
        assert!(cg.is_empty());
    }

    #[test]
    fn commit_attempts_every_connection() {
        let mock = Mock::new();
        mock.fail_commit("master");
        let g = group(&mock);
        let other = PhysicsDBGroup::new("other", mock.service("o"));
        let mut cg = ConnectionsGroup::new(ConnectionFetcher::Write { auto_commit: false });
        cg.get_connection(&g).unwrap();
        cg.get_connection(&other).unwrap();

        let err = cg.commit().unwrap_err();
        assert_eq!(err.message, "commit failed on master");
        assert!(mock.events().contains(&"o:commit".to_string()));

        cg.rollback().unwrap();
        assert!(mock.events().contains(&"master:rollback".to_string()));
        assert!(mock.events().contains(&"o:rollback".to_string()));
    }

    #[test]
    fn close_releases_all_and_returns_failures() {
        let mock = Mock::new();
        mock.fail_close("master");
        let g = group(&mock);
        let other = PhysicsDBGroup::new("other", mock.service("o"));
        let mut cg = ConnectionsGroup::new(ConnectionFetcher::NoDelayRead);
        cg.get_connection(&g).unwrap();
        cg.get_connection(&other).unwrap();

        let errors = cg.close();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "close failed on master");
        assert!(mock.events().contains(&"o:close".to_string()));
        assert!(cg.is_empty());
    }

    #[test]
    fn dropped_group_is_closed() {
        let mock = Mock::new();
        let g = group(&mock);
        {
            let mut cg = ConnectionsGroup::new(ConnectionFetcher::NoDelayRead);
            cg.get_connection(&g).unwrap();
        }
        assert_eq!(mock.events(), vec!["master:open", "master:close"]);
    }

    #[test]
    fn isolation_save_points() {
        let mock = Mock::new();
        let g = group(&mock);
        let other = PhysicsDBGroup::new("other", mock.service("o"));
        let mut cg = ConnectionsGroup::new(ConnectionFetcher::NoDelayRead);

        cg.get_connection(&g).unwrap();
        let first = cg.set_transaction_isolation(IsolationLevel::Serializable).unwrap();
        assert!(cg.is_isolation_level_changed());

        // 之后获取的连接也使用当前级别
        cg.get_connection(&other).unwrap();
        cg.set_transaction_isolation(IsolationLevel::RepeatableRead).unwrap();
        cg.reset_transaction_isolation_to_last_save_pointer().unwrap();
        assert_eq!(
            cg.get_connection(&other).unwrap().transaction_isolation(),
            Ok(IsolationLevel::Serializable)
        );

        cg.reset_transaction_isolation_to(first).unwrap();
        assert!(!cg.is_isolation_level_changed());
        assert_eq!(
            cg.get_connection(&g).unwrap().transaction_isolation(),
            Ok(IsolationLevel::ReadCommitted)
        );
        assert_eq!(
            mock.events(),
            vec![
                "master:open",
                "master:isolation=Serializable",
                "o:open",
                "o:isolation=Serializable",
                "master:isolation=RepeatableRead",
                "o:isolation=RepeatableRead",
                "master:isolation=Serializable",
                "o:isolation=Serializable",
                "master:isolation=ReadCommitted",
                "o:isolation=ReadCommitted",
            ]
        );

        // 已经回退过的保存点不再生效
        cg.reset_transaction_isolation_to(first).unwrap();
        assert_eq!(mock.events().len(), 10);
    }
}
