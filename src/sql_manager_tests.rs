#[cfg(test)]
mod tests {
    use crate::bean::Record;
    use crate::dialect::Dialect;
    use crate::error::{ConfigError, DaoError};
    use crate::flavor::Flavor;
    use crate::mapping::{ObjectMapping, ObjectMappingManager, Table, TableColumn};
    use crate::sql_manager::{CompiledSQLManager, PK_PARAM};
    use crate::sql_type::SqlDataType;
    use crate::test_support::sql_manager;
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn crud_statements_for_business() {
        let sqls = sql_manager(Flavor::MySQL);
        let article = sqls.business_sqls("article").unwrap();
        assert_eq!(
            article.insert.sql(),
            "insert into @@article(id, NAME, DESCRIPTION, createdTime) values(:id, :title, :content, :createdTime)"
        );
        assert_eq!(
            article.insert_without_pk.sql(),
            "insert into @@article(NAME, DESCRIPTION, createdTime) values(:title, :content, :createdTime)"
        );
        assert_eq!(
            article.update.as_ref().map(|u| u.sql()),
            Some("update @@article set NAME=:title, DESCRIPTION=:content, createdTime=:createdTime where id=:id")
        );
        assert_eq!(article.delete.sql(), "delete from @@article where id=:id");
        assert_eq!(
            article.select.sql(),
            "select id, NAME, DESCRIPTION, createdTime from @@article where id=:id"
        );
    }

    #[test]
    fn version_column_increments_and_guards_update() {
        let sqls = sql_manager(Flavor::MySQL);
        let user = sqls.business_sqls("user").unwrap();
        assert_eq!(
            user.update.as_ref().map(|u| u.sql()),
            Some("update @@user set userName=:userName, VIP_POINTS=:vipPoints, version = version + 1 where pk=:id and version=:version")
        );

        let bean = Record::new()
            .with("id", 1)
            .with("userName", "lily")
            .with("vipPoints", "20")
            .with("version", 3);
        let update = user.update.as_ref().unwrap();
        let p = update.bind_bean(&bean).unwrap().prepare(None).unwrap();
        assert_eq!(
            p.sql,
            "update TB_USER set userName=?, VIP_POINTS=?, version = version + 1 where pk=? and version=?"
        );
        assert_eq!(
            p.params,
            vec![SqlValue::from("lily"), SqlValue::I64(20), SqlValue::I64(1), SqlValue::I64(3)]
        );
    }

    #[test]
    fn partial_update_on_demand() {
        let sqls = sql_manager(Flavor::PostgreSQL);
        let cs = sqls.build_update_sql("article", &["title", "id"]).unwrap();
        assert_eq!(cs.sql(), "update @@article set @title=:title where id=:id");

        let bean = Record::new().with("id", 5).with("title", "t");
        let p = cs.bind_bean(&bean).unwrap().prepare(None).unwrap();
        assert_eq!(p.sql, "update TB_ARTICLE set NAME=$1 where id=$2");

        assert!(matches!(
            sqls.build_update_sql("article", &["id"]),
            Err(DaoError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn load_column_by_pk() {
        let sqls = sql_manager(Flavor::MySQL);
        let cs = sqls.build_load_column_by_pk_sql("article", "NAME").unwrap();
        assert_eq!(cs.sql(), format!("select NAME from @@article where id=:{PK_PARAM}"));

        let b = cs.bind("id", "7").unwrap();
        assert_eq!(b.value(PK_PARAM), Some(&SqlValue::I64(7)));
    }

    #[test]
    fn named_sql_registry() {
        let mut sqls = sql_manager(Flavor::MySQL);
        let cs = sqls.build_sql("article", "select * from @@article where @id=:id").unwrap();
        sqls.add_sql("article.byId", cs);
        assert_eq!(
            sqls.get_sql("article.byId").unwrap().sql(),
            "select * from @@article where @id=:id"
        );
        assert_eq!(
            sqls.get_sql("nope").map(|_| ()),
            Err(ConfigError::SqlNotFound("nope".to_string()))
        );
    }

    #[test]
    fn insert_and_update_flags_are_honored() {
        let dialect = Arc::new(Dialect::new(Flavor::MySQL));
        let mut mappings = ObjectMappingManager::new();
        mappings.register(ObjectMapping::new(
            "event",
            "default",
            Table::new("TB_EVENT", Arc::clone(&dialect))
                .column(TableColumn::new("id", "id", SqlDataType::BigInt))
                .column(TableColumn::new("kind", "kind", SqlDataType::String).updatable(false))
                .column(TableColumn::new("total", "total", SqlDataType::Int).insertable(false))
                .pk("id"),
        ));
        mappings.register(ObjectMapping::new(
            "log",
            "default",
            Table::new("TB_LOG", dialect).column(TableColumn::new("msg", "msg", SqlDataType::String)),
        ));

        let sqls = CompiledSQLManager::new(Arc::new(mappings)).unwrap();
        let event = sqls.business_sqls("event").unwrap();
        assert_eq!(event.insert.sql(), "insert into @@event(id, kind) values(:id, :kind)");
        assert_eq!(
            event.update.as_ref().map(|u| u.sql()),
            Some("update @@event set total=:total where id=:id")
        );

        assert_eq!(
            sqls.business_sqls("log").map(|_| ()),
            Err(ConfigError::NoPrimaryKey("log".to_string()))
        );
        assert_eq!(
            sqls.business_sqls("missing").map(|_| ()),
            Err(ConfigError::MappingNotFound("missing".to_string()))
        );
    }

    #[test]
    fn pk_only_business_has_no_update() {
        let dialect = Arc::new(Dialect::new(Flavor::MySQL));
        let mut mappings = ObjectMappingManager::new();
        mappings.register(ObjectMapping::new(
            "tag",
            "default",
            Table::new("TB_TAG", Arc::clone(&dialect))
                .column(TableColumn::new("id", "id", SqlDataType::BigInt))
                .column(TableColumn::new("label", "label", SqlDataType::String).updatable(false))
                .pk("id"),
        ));
        mappings.register(ObjectMapping::new(
            "counter",
            "default",
            Table::new("TB_COUNTER", dialect)
                .column(TableColumn::new("id", "id", SqlDataType::BigInt))
                .column(TableColumn::new("version", "version", SqlDataType::Int))
                .pk("id")
                .version("version"),
        ));

        let sqls = CompiledSQLManager::new(Arc::new(mappings)).unwrap();
        let tag = sqls.business_sqls("tag").unwrap();
        assert!(tag.update.is_none());
        assert_eq!(tag.delete.sql(), "delete from @@tag where id=:id");

        let counter = sqls.business_sqls("counter").unwrap();
        assert_eq!(
            counter.update.as_ref().map(|u| u.sql()),
            Some("update @@counter set version = version + 1 where id=:id and version=:version")
        );
    }
}
