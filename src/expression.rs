//! SearchExpression：条件 + 投影 + 排序 + 分页 + 锁 + 分表键，降为 count / select / delete 语句。
//!
//! 降级后的语句仍是带标记的文本（`@@business`、`:param`），分页由会话按方言改写，不写进文本。

use crate::args::Args;
use crate::compiled_sql::LockMode;
use crate::error::CompileError;
use crate::mapping::ObjectMapping;
use crate::marked_sql::MarkedSQL;
use crate::table_condition::TableCondition;
use crate::term::SearchTerm;
use std::sync::Arc;

/// 分页偏移量与页大小的上限（数据库 `limit`/`offset` 为有符号 64 位）。
pub const MAX_OFFSET: usize = i64::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchExpression {
    business: String,
    condition: Option<SearchTerm>,
    selected_props: Option<String>,
    order_by: Option<String>,
    count_select_phrase: Option<String>,
    page_no: usize,
    page_size: Option<usize>,
    lock_mode: LockMode,
    table_condition: Option<TableCondition>,
    load_records: bool,
    compute_record_number: bool,
}

impl SearchExpression {
    /// 不分页，返回全部记录。
    pub fn for_business(business: impl Into<String>) -> Self {
        Self {
            business: business.into(),
            condition: None,
            selected_props: None,
            order_by: None,
            count_select_phrase: None,
            page_no: 1,
            page_size: None,
            lock_mode: LockMode::None,
            table_condition: None,
            load_records: true,
            compute_record_number: true,
        }
    }

    /// 分页查询；页号从 1 开始，小于 1 按 1 处理。
    pub fn paged(business: impl Into<String>, page_no: usize, page_size: usize) -> Self {
        let mut se = Self::for_business(business);
        se.set_page_no(page_no).set_page_size(page_size);
        se
    }

    pub fn business(&self) -> &str {
        &self.business
    }

    /// 追加一个 and 条件。
    pub fn and(&mut self, term: SearchTerm) -> &mut Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => SearchTerm::and(existing, term),
            None => term,
        });
        self
    }

    /// 追加一个 or 条件。
    pub fn or(&mut self, term: SearchTerm) -> &mut Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => SearchTerm::or(existing, term),
            None => term,
        });
        self
    }

    pub fn condition(&self) -> Option<&SearchTerm> {
        self.condition.as_ref()
    }

    /// 逗号分隔的属性名，如 `"title, createdTime"`。
    pub fn set_selected_props(&mut self, props: impl Into<String>) -> &mut Self {
        self.selected_props = Some(props.into());
        self
    }

    /// 如 `"title desc, id asc"`，属性名会被替换为列名。
    pub fn set_order_by(&mut self, order_by: impl Into<String>) -> &mut Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// 替换统计语句里的 `count(*)`，如 `"max(title)"`。
    pub fn set_count_select_phrase(&mut self, phrase: impl Into<String>) -> &mut Self {
        self.count_select_phrase = Some(phrase.into());
        self
    }

    pub fn set_page_no(&mut self, page_no: usize) -> &mut Self {
        self.page_no = page_no.max(1);
        self
    }

    pub fn set_page_size(&mut self, page_size: usize) -> &mut Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn set_lock_mode(&mut self, lock_mode: LockMode) -> &mut Self {
        self.lock_mode = lock_mode;
        self
    }

    pub fn set_table_condition(&mut self, condition: TableCondition) -> &mut Self {
        self.table_condition = Some(condition);
        self
    }

    pub fn set_load_records(&mut self, load: bool) -> &mut Self {
        self.load_records = load;
        self
    }

    pub fn set_compute_record_number(&mut self, compute: bool) -> &mut Self {
        self.compute_record_number = compute;
        self
    }

    pub fn page_no(&self) -> usize {
        self.page_no
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn lock_mode(&self) -> LockMode {
        self.lock_mode
    }

    pub fn table_condition(&self) -> Option<&TableCondition> {
        self.table_condition.as_ref()
    }

    pub fn load_records(&self) -> bool {
        self.load_records
    }

    pub fn compute_record_number(&self) -> bool {
        self.compute_record_number
    }

    /// 第一条记录的位置，从 1 开始。
    /// 超出 `MAX_OFFSET` 时按 `MAX_OFFSET + 1` 处理。
    pub fn start_pos(&self) -> usize {
        self.page_no
            .saturating_sub(1)
            .saturating_mul(self.page_size.unwrap_or(0))
            .min(MAX_OFFSET)
            .saturating_add(1)
    }

    /// `(offset, limit)`；不分页（或页大小为 0）时为 `None`。
    pub fn paging(&self) -> Option<(usize, usize)> {
        self.page_size
            .filter(|size| *size > 0)
            .map(|size| (self.start_pos() - 1, size.min(MAX_OFFSET)))
    }

    /// 条件是否为空查询（没有条件不算空查询）。
    pub fn is_empty_query(&self) -> bool {
        self.condition.as_ref().is_some_and(SearchTerm::is_empty_query)
    }

    fn where_clause(&self, mapping: &ObjectMapping, args: &mut Args) -> Result<String, CompileError> {
        let predicate = match &self.condition {
            Some(term) => term.to_expression(mapping, args)?,
            None => String::new(),
        };
        let predicate = predicate.trim();
        if predicate.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" where {predicate}"))
        }
    }

    pub fn to_compute_record_number_sql(
        &self,
        mapping: &Arc<ObjectMapping>,
        args: &mut Args,
    ) -> Result<MarkedSQL, CompileError> {
        let phrase = match &self.count_select_phrase {
            Some(p) => translate_props(mapping, p),
            None => "count(*)".to_string(),
        };
        let sql = format!(
            "select {phrase} from @@{}{}",
            mapping.business(),
            self.where_clause(mapping, args)?
        );
        Ok(MarkedSQL::new(Arc::clone(mapping), sql))
    }

    pub fn to_load_records_marked_sql(
        &self,
        mapping: &Arc<ObjectMapping>,
        args: &mut Args,
    ) -> Result<MarkedSQL, CompileError> {
        let projection = match &self.selected_props {
            Some(p) => translate_props(mapping, p),
            None => mapping
                .table()
                .columns()
                .iter()
                .map(|c| c.col_name_for_sql())
                .collect::<Vec<_>>()
                .join(", "),
        };
        let mut sql = format!(
            "select {projection} from @@{}{}",
            mapping.business(),
            self.where_clause(mapping, args)?
        );
        if let Some(order_by) = &self.order_by {
            sql.push_str(" order by ");
            sql.push_str(&translate_props(mapping, order_by));
        }
        Ok(MarkedSQL::new(Arc::clone(mapping), sql))
    }

    pub fn to_delete_record_sql(
        &self,
        mapping: &Arc<ObjectMapping>,
        args: &mut Args,
    ) -> Result<MarkedSQL, CompileError> {
        let sql = format!(
            "delete from @@{}{}",
            mapping.business(),
            self.where_clause(mapping, args)?
        );
        Ok(MarkedSQL::new(Arc::clone(mapping), sql))
    }
}

/// 把短语中的属性名替换为列名，其它标识符（函数名、asc/desc、列名）保持原样。
fn translate_props(mapping: &ObjectMapping, phrase: &str) -> String {
    let mut out = String::with_capacity(phrase.len() + 16);
    let mut chars = phrase.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c == '\'' {
            out.push(c);
            for (_, q) in chars.by_ref() {
                out.push(q);
                if q == '\'' {
                    break;
                }
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some(&(i, n)) = chars.peek() {
                if n.is_ascii_alphanumeric() || n == '_' {
                    end = i + n.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &phrase[start..end];
            out.push_str(mapping.col_name_by_prop(word).unwrap_or(word));
        } else {
            out.push(c);
        }
    }
    out
}

/// 分页结果。
#[derive(Debug, Clone, PartialEq)]
pub struct PageFlip<T> {
    pub page_no: usize,
    pub page_size: usize,
    /// 未要求统计总数时为 `None`。
    pub total_count: Option<u64>,
    pub elements: Vec<T>,
}

impl<T> PageFlip<T> {
    /// 总页数；未统计总数时为 `None`。
    pub fn page_count(&self) -> Option<u64> {
        let size = self.page_size as u64;
        match (self.total_count, size) {
            (Some(_), 0) => Some(0),
            (Some(total), size) => Some(total.div_ceil(size)),
            (None, _) => None,
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.page_count()
            .is_some_and(|count| (self.page_no as u64) < count)
    }
}
