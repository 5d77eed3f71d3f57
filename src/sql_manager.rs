//! CompiledSQLManager：命名语句注册表，以及为每个业务生成的增删改查语句。

use crate::compiled_sql::CompiledSQL;
use crate::error::{ConfigError, DaoError};
use crate::mapping::{ObjectMapping, ObjectMappingManager};
use crate::marked_sql::MarkedSQL;
use std::collections::HashMap;
use std::sync::Arc;

/// 主键加载单列时使用的参数名。
pub const PK_PARAM: &str = "guzz_pk";

/// 一个业务的增删改查语句。
#[derive(Debug, Clone)]
pub struct BusinessSqls {
    /// 带主键列的插入。
    pub insert: Arc<CompiledSQL>,
    /// 不带主键列的插入，主键由数据库生成。
    pub insert_without_pk: Arc<CompiledSQL>,
    /// 没有可更新列时为 `None`。
    pub update: Option<Arc<CompiledSQL>>,
    pub delete: Arc<CompiledSQL>,
    pub select: Arc<CompiledSQL>,
}

#[derive(Debug)]
pub struct CompiledSQLManager {
    mappings: Arc<ObjectMappingManager>,
    sqls: HashMap<String, Arc<CompiledSQL>>,
    businesses: HashMap<String, BusinessSqls>,
}

fn pk_of(mapping: &ObjectMapping) -> Result<(&str, &str), ConfigError> {
    mapping
        .table()
        .pk_column()
        .map(|c| (c.col_name_for_sql(), c.prop()))
        .ok_or_else(|| ConfigError::NoPrimaryKey(mapping.business().to_string()))
}

impl CompiledSQLManager {
    /// 为每个有主键的业务生成增删改查语句。
    pub fn new(mappings: Arc<ObjectMappingManager>) -> Result<Self, DaoError> {
        let mut manager = Self {
            mappings,
            sqls: HashMap::new(),
            businesses: HashMap::new(),
        };
        let names: Vec<String> = manager.mappings.businesses().map(str::to_string).collect();
        for business in names {
            let mapping = manager.mappings.get(&business)?;
            if mapping.table().pk_column().is_none() {
                continue;
            }
            let sqls = manager.build_business_sqls(&mapping)?;
            manager.businesses.insert(business, sqls);
        }
        Ok(manager)
    }

    pub fn mappings(&self) -> &Arc<ObjectMappingManager> {
        &self.mappings
    }

    /// 编译一段带标记的 SQL，`business` 为所属映射。
    pub fn build_sql(&self, business: &str, sql: &str) -> Result<CompiledSQL, DaoError> {
        let mapping = self.mappings.get(business)?;
        MarkedSQL::new(mapping, sql).compile(&self.mappings)
    }

    pub fn add_sql(&mut self, id: impl Into<String>, sql: CompiledSQL) -> Arc<CompiledSQL> {
        let sql = Arc::new(sql);
        self.sqls.insert(id.into(), Arc::clone(&sql));
        sql
    }

    pub fn get_sql(&self, id: &str) -> Result<Arc<CompiledSQL>, ConfigError> {
        self.sqls
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::SqlNotFound(id.to_string()))
    }

    pub fn business_sqls(&self, business: &str) -> Result<&BusinessSqls, ConfigError> {
        match self.businesses.get(business) {
            Some(sqls) => Ok(sqls),
            None => {
                let mapping = self.mappings.get(business)?;
                Err(ConfigError::NoPrimaryKey(mapping.business().to_string()))
            }
        }
    }

    fn compile_with_props<'p>(
        &self,
        mapping: &Arc<ObjectMapping>,
        sql: String,
        props: impl IntoIterator<Item = &'p str>,
    ) -> Result<Arc<CompiledSQL>, DaoError> {
        let mut cs = MarkedSQL::new(Arc::clone(mapping), sql).compile(&self.mappings)?;
        for prop in props {
            cs = cs.with_param_prop(prop, prop);
        }
        Ok(Arc::new(cs))
    }

    fn build_business_sqls(&self, mapping: &Arc<ObjectMapping>) -> Result<BusinessSqls, DaoError> {
        let (pk_col, pk_prop) = pk_of(mapping)?;
        let business = mapping.business();
        let table = mapping.table();
        let version = table.version_column();

        let insert_cols: Vec<_> = table.columns().iter().filter(|c| c.allow_insert()).collect();
        let insert_sql = |with_pk: bool| {
            let cols: Vec<_> = insert_cols
                .iter()
                .copied()
                .filter(|c| with_pk || c.prop() != pk_prop)
                .collect();
            let names: Vec<&str> = cols.iter().map(|c| c.col_name_for_sql()).collect();
            let params: Vec<String> = cols.iter().map(|c| format!(":{}", c.prop())).collect();
            let props: Vec<&str> = cols.iter().map(|c| c.prop()).collect();
            (
                format!(
                    "insert into @@{business}({}) values({})",
                    names.join(", "),
                    params.join(", ")
                ),
                props,
            )
        };
        let (sql, props) = insert_sql(true);
        let insert = self.compile_with_props(mapping, sql, props)?;
        let (sql, props) = insert_sql(false);
        let insert_without_pk = self.compile_with_props(mapping, sql, props)?;

        let mut sets = Vec::new();
        let mut update_props = Vec::new();
        for c in table.columns().iter().filter(|c| c.allow_update() && c.prop() != pk_prop) {
            if version.is_some_and(|v| v.prop() == c.prop()) {
                let v = c.col_name_for_sql();
                sets.push(format!("{v} = {v} + 1"));
            } else {
                sets.push(format!("{}=:{}", c.col_name_for_sql(), c.prop()));
                update_props.push(c.prop());
            }
        }
        let update = if sets.is_empty() {
            None
        } else {
            let mut sql = format!(
                "update @@{business} set {} where {pk_col}=:{pk_prop}",
                sets.join(", ")
            );
            update_props.push(pk_prop);
            if let Some(v) = version {
                sql.push_str(&format!(" and {}=:{}", v.col_name_for_sql(), v.prop()));
                update_props.push(v.prop());
            }
            Some(self.compile_with_props(mapping, sql, update_props)?)
        };

        let delete = self.compile_with_props(
            mapping,
            format!("delete from @@{business} where {pk_col}=:{pk_prop}"),
            [pk_prop],
        )?;

        let cols: Vec<&str> = table.columns().iter().map(|c| c.col_name_for_sql()).collect();
        let select = self.compile_with_props(
            mapping,
            format!(
                "select {} from @@{business} where {pk_col}=:{pk_prop}",
                cols.join(", ")
            ),
            [pk_prop],
        )?;

        Ok(BusinessSqls {
            insert,
            insert_without_pk,
            update,
            delete,
            select,
        })
    }

    /// 只更新给定属性的语句，按需生成。
    pub fn build_update_sql(&self, business: &str, props: &[&str]) -> Result<Arc<CompiledSQL>, DaoError> {
        let mapping = self.mappings.get(business)?;
        let (pk_col, pk_prop) = pk_of(&mapping)?;
        let sets: Vec<String> = props
            .iter()
            .filter(|p| **p != pk_prop)
            .map(|p| format!("@{p}=:{p}"))
            .collect();
        if sets.is_empty() {
            return Err(ConfigError::Invalid(format!("no property to update for business [{business}]")).into());
        }
        let sql = format!(
            "update @@{business} set {} where {pk_col}=:{pk_prop}",
            sets.join(", ")
        );
        let bind_props = props.iter().copied().chain([pk_prop]);
        self.compile_with_props(&mapping, sql, bind_props)
    }

    /// 按主键读取一列（或一个表达式）的语句，主键参数名为 `guzz_pk`。
    pub fn build_load_column_by_pk_sql(&self, business: &str, column: &str) -> Result<Arc<CompiledSQL>, DaoError> {
        let mapping = self.mappings.get(business)?;
        let (pk_col, pk_prop) = pk_of(&mapping)?;
        let sql = format!("select {column} from @@{business} where {pk_col}=:{PK_PARAM}");
        let cs = MarkedSQL::new(Arc::clone(&mapping), sql)
            .compile(&self.mappings)?
            .with_param_prop(PK_PARAM, pk_prop);
        Ok(Arc::new(cs))
    }
}
