//! 宏集合：以 `"key" => value` 的形式构造 `Record`、`TableCondition` 和参数列表，
//! 值可以是任何能转换为 `SqlValue` 的类型。

#[doc(hidden)]
#[macro_export]
macro_rules! __kv_into {
    ($ctor:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $ctor$(.with($key, $crate::SqlValue::from($value)))*
    };
}

/// 构造 `Record`：`record! { "id" => 1_i64, "title" => "lily" }`。
#[macro_export]
macro_rules! record {
    ($($key:expr => $value:expr),* $(,)?) => {
        $crate::__kv_into!($crate::Record::new() $(, $key => $value)*)
    };
}

/// 构造 `TableCondition`：`table_condition! { "shardKey" => 3_i64 }`。
#[macro_export]
macro_rules! table_condition {
    ($($key:expr => $value:expr),* $(,)?) => {
        $crate::__kv_into!($crate::TableCondition::new() $(, $key => $value)*)
    };
}

/// 命名语句的参数列表：`params! { "title" => "lily" }` 得到 `Vec<(&str, SqlValue)>`。
#[macro_export]
macro_rules! params {
    ($($key:expr => $value:expr),* $(,)?) => {
        vec![$(($key, $crate::SqlValue::from($value))),*]
    };
}
