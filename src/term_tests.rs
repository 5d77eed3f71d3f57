#[cfg(test)]
mod tests {
    use crate::args::Args;
    use crate::dialect::Dialect;
    use crate::error::CompileError;
    use crate::flavor::Flavor;
    use crate::mapping::ObjectMapping;
    use crate::term::SearchTerm;
    use crate::test_support::article_mapping;
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn article() -> ObjectMapping {
        article_mapping(Arc::new(Dialect::new(Flavor::MySQL)))
    }

    fn render(term: &SearchTerm) -> (String, Args) {
        let mut args = Args::new();
        let sql = term.to_expression(&article(), &mut args).unwrap();
        (sql, args)
    }

    #[test]
    fn comparisons_render_columns_and_params() {
        let cases = vec![
            (SearchTerm::eq("title", "guzz"), "NAME = :title_0"),
            (SearchTerm::ne("id", 3), "id <> :id_0"),
            (SearchTerm::gt("id", 3), "id > :id_0"),
            (SearchTerm::ge("id", 3), "id >= :id_0"),
            (SearchTerm::lt("id", 3), "id < :id_0"),
            (SearchTerm::le("id", 3), "id <= :id_0"),
            (SearchTerm::like("title", "%guzz%"), "NAME like :title_0"),
            (SearchTerm::ilike("title", "%guzz%"), "lower(NAME) like lower(:title_0)"),
            (SearchTerm::eq_ignore_case("title", "Guzz"), "lower(NAME) = lower(:title_0)"),
            (SearchTerm::in_("title", ["a", "b"]), "NAME in (:title_0, :title_1)"),
        ];
        for (term, expected) in cases {
            assert_eq!(render(&term).0, expected);
        }
    }

    #[test]
    fn null_values_render_is_null() {
        let (sql, args) = render(&SearchTerm::eq("title", SqlValue::Null));
        assert_eq!(sql, "NAME is null");
        assert!(args.is_empty());

        let (sql, _) = render(&SearchTerm::ne("title", SqlValue::Null));
        assert_eq!(sql, "NAME is not null");
    }

    #[test]
    fn values_are_coerced_except_like_patterns() {
        let (_, args) = render(&SearchTerm::gt("id", "5"));
        assert_eq!(args.value("id_0"), Some(&SqlValue::I64(5)));

        let (_, args) = render(&SearchTerm::like("id", "1%"));
        assert_eq!(args.value("id_0"), Some(&SqlValue::from("1%")));

        let mut args = Args::new();
        assert!(matches!(
            SearchTerm::gt("id", "abc").to_expression(&article(), &mut args),
            Err(CompileError::Conversion(_))
        ));
    }

    #[test]
    fn ilike_uses_dialect() {
        let m = article_mapping(Arc::new(Dialect::new(Flavor::PostgreSQL)));
        let mut args = Args::new();
        let sql = SearchTerm::ilike("title", "%g%").to_expression(&m, &mut args).unwrap();
        assert_eq!(sql, "NAME ilike :title_0");
    }

    #[test]
    fn concat_wraps_nested_groups() {
        let term = SearchTerm::and(SearchTerm::eq("title", "a"), SearchTerm::gt("id", 1));
        assert_eq!(render(&term).0, " NAME = :title_0 and id > :id_0 ");

        let term = SearchTerm::or(term, SearchTerm::like("content", "%x%"));
        let (sql, args) = render(&term);
        assert_eq!(sql, " (NAME = :title_0 and id > :id_0) or DESCRIPTION like :content_0 ");
        let names: Vec<&str> = args.params().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["title_0", "id_0", "content_0"]);
    }

    #[test]
    fn same_prop_gets_distinct_params() {
        let term = SearchTerm::all([SearchTerm::gt("id", 1), SearchTerm::lt("id", 9)]).unwrap();
        let (sql, args) = render(&term);
        assert_eq!(sql, " id > :id_0 and id < :id_1 ");
        assert_eq!(args.value("id_1"), Some(&SqlValue::I64(9)));
    }

    #[test]
    fn empty_in_makes_empty_query() {
        let empty = SearchTerm::in_("id", Vec::<i64>::new());
        assert!(empty.is_empty_query());
        assert_eq!(render(&empty).0, "");

        let and = SearchTerm::and(empty.clone(), SearchTerm::eq("title", "a"));
        assert!(and.is_empty_query());
        let (sql, args) = render(&and);
        assert_eq!(sql, "");
        assert!(args.is_empty());

        // or 只要有一边非空就不是空查询，空的一边被省略
        let or = SearchTerm::or(empty, SearchTerm::eq("title", "a"));
        assert!(!or.is_empty_query());
        assert_eq!(render(&or).0, "NAME = :title_0");

        assert!(SearchTerm::And(None, None).is_empty_query());
        assert!(!SearchTerm::And(Some(Box::new(SearchTerm::eq("id", 1))), None).is_empty_query());
    }

    #[test]
    fn unknown_property_is_rejected() {
        let mut args = Args::new();
        assert_eq!(
            SearchTerm::eq("author", "x").to_expression(&article(), &mut args),
            Err(CompileError::UnknownProperty {
                business: "article".to_string(),
                prop: "author".to_string(),
            })
        );
    }

    #[test]
    fn any_and_all_fold_left() {
        assert_eq!(SearchTerm::any(Vec::new()), None);
        assert_eq!(
            SearchTerm::any([SearchTerm::eq("id", 1), SearchTerm::eq("id", 2)]),
            Some(SearchTerm::or(SearchTerm::eq("id", 1), SearchTerm::eq("id", 2)))
        );
    }
}
