//! SQL方言模块
//!
//! 将抽象列类型、字面量、分页与行锁子句翻译为各数据库厂商语法。
//! 方言是一个策略接口：连接池在初始化时检测一次并缓存整个生命周期；
//! 各厂商差异通过查找表选择具体实现，而不是类层次结构

use async_trait::async_trait;
use rat_logger::{info, warn};
use std::sync::Arc;

use crate::adapter::{DatabaseMetadata, NativeConnection};
use crate::error::{DbPoolError, DbPoolResult};
use crate::pool_error;
use crate::types::{DbType, SqlValue};

mod db2;
mod generic;
mod mssql;
mod mysql;
mod oracle;
mod postgres;

pub use db2::Db2Dialect;
pub use generic::{GenericDialect, H2Dialect, SqliteDialect};
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;

/// SQL方言策略接口
///
/// trait自带的默认实现即通用方言行为，具体方言按需覆盖
#[async_trait]
pub trait SqlDialect: Send + Sync + std::fmt::Debug {
    /// 方言名称
    fn name(&self) -> &'static str;

    /// 连接存活检测语句
    fn ping_sql(&self) -> &'static str {
        "SELECT 1"
    }

    /// 检测连接是否存活
    ///
    /// 返回 `Ok(false)` 表示连接已失效；`Err` 表示检测本身失败，
    /// 调用方应按连接失效处理
    async fn ping(&self, conn: &mut dyn NativeConnection) -> DbPoolResult<bool> {
        conn.execute(self.ping_sql()).await?;
        Ok(true)
    }

    /// 在新检测到的连接上执行方言所需的环境检查
    ///
    /// 检查失败只记录日志，绝不让池初始化失败
    async fn check(&self, _conn: &mut dyn NativeConnection) -> DbPoolResult<()> {
        info!("方言 {} 未定义数据库环境检查", self.name());
        Ok(())
    }

    /// 抽象列类型对应的厂商类型文本
    fn column_type(&self, db_type: DbType, size: u64, precision: u32, binary: bool) -> String {
        let _ = binary;
        match db_type {
            DbType::Boolean => "BOOLEAN".to_string(),
            DbType::Byte => "TINYINT".to_string(),
            DbType::Short => "SMALLINT".to_string(),
            DbType::Int => "INTEGER".to_string(),
            DbType::Long | DbType::Id => "BIGINT".to_string(),
            DbType::Float => "FLOAT".to_string(),
            DbType::Double => "DOUBLE PRECISION".to_string(),
            DbType::Decimal => format!("DECIMAL({},{})", size, precision),
            DbType::Char => format!("CHAR({})", size),
            DbType::String => format!("VARCHAR({})", size),
            DbType::Date => "DATE".to_string(),
            DbType::Time => "TIME".to_string(),
            DbType::DateTime => "TIMESTAMP".to_string(),
            DbType::Clob => "CLOB".to_string(),
            DbType::Blob => "BLOB".to_string(),
        }
    }

    /// 生成一段列定义DDL：类型 + 非空约束
    fn append_db_type(
        &self,
        out: &mut String,
        db_type: DbType,
        size: u64,
        precision: u32,
        mandatory: bool,
        binary: bool,
    ) {
        out.push_str(&self.column_type(db_type, size, precision, binary));
        if mandatory {
            out.push_str(" NOT NULL");
        } else {
            out.push_str(" NULL");
        }
    }

    /// 标识符加引号
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name)
    }

    /// 字符串字面量转义（含外层引号）
    fn escape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
        out.push('\'');
        out
    }

    /// 格式化SQL字面量
    ///
    /// 布尔值按 "1"/"0" 输出，多数方言没有布尔字面量
    fn literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Decimal(d) => d.clone(),
            SqlValue::Str(s) => self.escape(s),
            SqlValue::Bytes(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 3);
                out.push_str("X'");
                for byte in b {
                    out.push_str(&format!("{:02X}", byte));
                }
                out.push('\'');
                out
            }
            SqlValue::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
            SqlValue::Time(t) => format!("TIME '{}'", t.format("%H:%M:%S")),
            SqlValue::DateTime(dt) => {
                format!("TIMESTAMP '{}'", dt.format("%Y-%m-%d %H:%M:%S%.3f"))
            }
        }
    }

    /// 当前时间的SQL函数
    fn fn_now(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// 是否支持跳过结果前若干行
    fn supports_limit_start(&self) -> bool {
        false
    }

    /// 是否支持截断结果到若干行
    fn supports_limit_stop(&self) -> bool {
        false
    }

    /// 分页注入点一：写在整条SELECT之前的前缀，可以打开一层包装查询
    /// （如旧版Oracle的ROWNUM包装、旧版MSSQL的 `SELECT TOP n * FROM (`）
    ///
    /// 三个注入点必须成套调用：`limit_start` → 调用方自己的SELECT（其间可用
    /// `limit_columns` 追加辅助列）→ `limit_last` 收尾
    fn limit_start(&self, _sql: &mut String, _start_row: u64, _stop_row: u64) {}

    /// 分页注入点二：附加到选择列清单的辅助列片段
    fn limit_columns(&self, _sql: &mut String, _start_row: u64, _stop_row: u64) {}

    /// 分页注入点三：语句末尾的后缀，负责闭合包装（如 `LIMIT n OFFSET m`）
    fn limit_last(&self, _sql: &mut String, _start_row: u64, _stop_row: u64) {}

    /// 行锁注入点一：表引用之后的提示片段
    fn for_update1(&self) -> &'static str {
        ""
    }

    /// 行锁注入点二：语句末尾的片段
    ///
    /// 两个注入点必须同时使用才能获得行级锁
    fn for_update2(&self) -> &'static str {
        " FOR UPDATE"
    }

    /// 判断该错误对应的语句重试后是否有成功的可能
    fn can_retry(&self, _err: &DbPoolError) -> bool {
        false
    }

    /// 建议的默认重试次数
    fn retry_count(&self) -> u32 {
        3
    }
}

/// 方言查找表条目：元数据匹配条件 + 实现工厂
struct DialectMatcher {
    matches: fn(&DatabaseMetadata) -> bool,
    create: fn(&DatabaseMetadata) -> DbPoolResult<Arc<dyn SqlDialect>>,
}

/// 方言查找表，顺序即匹配优先级（与驱动名检查顺序一致）
static DIALECT_MATCHERS: &[DialectMatcher] = &[
    DialectMatcher {
        matches: |meta| meta.matches("MySQL"),
        create: |meta| {
            // 5.5 以下版本的行为差异无法兼容
            if meta.product_major < 5 || (meta.product_major == 5 && meta.product_minor < 5) {
                return Err(pool_error!(
                    dialect,
                    format!("至少需要MySQL 5.5（当前 {}）", meta.product_version)
                ));
            }
            Ok(Arc::new(MysqlDialect::new()))
        },
    },
    DialectMatcher {
        matches: |meta| meta.matches("MariaDB"),
        create: |_meta| Ok(Arc::new(MysqlDialect::new())),
    },
    DialectMatcher {
        matches: |meta| meta.matches("Oracle"),
        create: |meta| {
            if meta.driver_major <= 9 {
                return Err(pool_error!(dialect, "不支持Oracle 9及更早版本"));
            }
            if meta.driver_major >= 12 {
                if meta.product_major < 12 {
                    return Ok(Arc::new(OracleDialect::compat()));
                }
                return Ok(Arc::new(OracleDialect::current()));
            }
            Ok(Arc::new(OracleDialect::legacy()))
        },
    },
    DialectMatcher {
        matches: |meta| {
            meta.matches("Microsoft") || meta.matches("SQLServer") || meta.matches("jTDS")
        },
        create: |meta| {
            if meta.product_major <= 9 {
                return Ok(Arc::new(MssqlDialect::legacy()));
            }
            Ok(Arc::new(MssqlDialect::current()))
        },
    },
    DialectMatcher {
        matches: |meta| meta.matches("IBM") || meta.matches("DB2"),
        create: |_meta| Ok(Arc::new(Db2Dialect)),
    },
    DialectMatcher {
        matches: |meta| meta.matches("H2"),
        create: |_meta| Ok(Arc::new(generic::H2Dialect)),
    },
    DialectMatcher {
        matches: |meta| meta.matches("PostgreSQL"),
        create: |_meta| Ok(Arc::new(PostgresDialect)),
    },
    DialectMatcher {
        matches: |meta| meta.matches("SQLite"),
        create: |_meta| Ok(Arc::new(generic::SqliteDialect)),
    },
];

/// 根据数据库元数据检测方言
///
/// 没有任何条目命中时回退到通用方言并发出警告，绝不让池启动失败
pub fn detect_dialect(meta: &DatabaseMetadata) -> DbPoolResult<Arc<dyn SqlDialect>> {
    for matcher in DIALECT_MATCHERS {
        if (matcher.matches)(meta) {
            return (matcher.create)(meta);
        }
    }
    warn!(
        "驱动 {} / 产品 {} 不在已知方言列表中，回退到通用方言",
        meta.driver_name, meta.product_name
    );
    Ok(Arc::new(GenericDialect))
}

/// 按名称获取方言（配置显式覆盖时使用，跳过自动检测）
pub fn dialect_by_name(name: &str) -> DbPoolResult<Arc<dyn SqlDialect>> {
    match name.to_lowercase().as_str() {
        "generic" => Ok(Arc::new(GenericDialect)),
        "mysql" | "mariadb" => Ok(Arc::new(MysqlDialect::new())),
        "postgresql" | "postgres" | "pg" => Ok(Arc::new(PostgresDialect)),
        "oracle" => Ok(Arc::new(OracleDialect::current())),
        "mssql" | "sqlserver" => Ok(Arc::new(MssqlDialect::current())),
        "db2" => Ok(Arc::new(Db2Dialect)),
        "h2" => Ok(Arc::new(generic::H2Dialect)),
        "sqlite" => Ok(Arc::new(generic::SqliteDialect)),
        other => Err(pool_error!(dialect, format!("未知的方言名称: {}", other))),
    }
}
