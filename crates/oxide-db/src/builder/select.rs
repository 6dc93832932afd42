//! SELECT-family clauses and compilation.

use once_cell::sync::Lazy;
use regex::Regex;

use super::conditions::{find_operator, has_operator, ClauseKind};
use super::{GroupItem, OrderItem, QueryBuilder, SelectItem};
use crate::error::{DbError, Result};
use crate::protect::{escape_identifiers, track_aliases};

static JOIN_CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\sAND\s|\sOR\s").expect("join conjunction pattern is valid"));

static TRAILING_DIRECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(ASC|DESC)$").expect("direction pattern is valid"));

/// Aggregate functions for [`QueryBuilder::select_aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// `MAX(field)`
    Max,
    /// `MIN(field)`
    Min,
    /// `AVG(field)`
    Avg,
    /// `SUM(field)`
    Sum,
}

impl Aggregate {
    /// Returns the SQL function name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Avg => "AVG",
            Self::Sum => "SUM",
        }
    }
}

/// JOIN types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    /// Plain `JOIN`.
    #[default]
    Plain,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `OUTER JOIN`
    Outer,
    /// `INNER JOIN`
    Inner,
    /// `LEFT OUTER JOIN`
    LeftOuter,
    /// `RIGHT OUTER JOIN`
    RightOuter,
}

impl JoinType {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Left => "LEFT ",
            Self::Right => "RIGHT ",
            Self::Outer => "OUTER ",
            Self::Inner => "INNER ",
            Self::LeftOuter => "LEFT OUTER ",
            Self::RightOuter => "RIGHT OUTER ",
        }
    }
}

/// ORDER BY directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
    /// Random order. A digit-only field is used as the seed.
    Random,
}

impl QueryBuilder {
    fn push_select(&mut self, expr: &str, escape: Option<bool>) {
        let item = SelectItem {
            expr: String::from(expr),
            escape,
        };
        self.record(|c| c.select.push(item.clone()));
    }

    /// Adds comma-separated columns to the SELECT list.
    pub fn select(&mut self, columns: &str) -> &mut Self {
        for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            self.push_select(column, None);
        }
        self
    }

    /// Adds one expression to the SELECT list without protecting it.
    pub fn select_raw(&mut self, expr: &str) -> &mut Self {
        let expr = expr.trim();
        if !expr.is_empty() {
            self.push_select(expr, Some(false));
        }
        self
    }

    /// Adds `KIND(field) AS alias`.
    ///
    /// Without an alias the last dotted segment of the field is used.
    pub fn select_aggregate(&mut self, kind: Aggregate, field: &str, alias: Option<&str>) -> &mut Self {
        let field = field.trim();
        if field.is_empty() {
            self.park(DbError::InvalidQuery(format!(
                "{} requires a field name",
                kind.as_str()
            )));
            return self;
        }
        let alias = alias
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| field.rsplit('.').next().unwrap_or(field));

        let expr = format!(
            "{}({}) AS {}",
            kind.as_str(),
            self.protect_identifiers(field, false, None, true),
            escape_identifiers(self.dialect(), alias)
        );
        self.push_select(&expr, None);
        self
    }

    /// Adds `MAX(field)`.
    pub fn select_max(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate(Aggregate::Max, field, alias)
    }

    /// Adds `MIN(field)`.
    pub fn select_min(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate(Aggregate::Min, field, alias)
    }

    /// Adds `AVG(field)`.
    pub fn select_avg(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate(Aggregate::Avg, field, alias)
    }

    /// Adds `SUM(field)`.
    pub fn select_sum(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate(Aggregate::Sum, field, alias)
    }

    /// Adds `DISTINCT` to the SELECT.
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Adds comma-separated tables to FROM. `users u` declares alias `u`.
    pub fn from(&mut self, tables: &str) -> &mut Self {
        for table in tables.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            self.record(|c| track_aliases(&mut c.aliases, table));
            let protected = self.protect_identifiers(table, true, None, false);
            self.record(|c| c.from.push(protected.clone()));
        }
        self
    }

    /// Adds a JOIN.
    ///
    /// A condition without an operator becomes `USING (condition)`.
    pub fn join(&mut self, table: &str, condition: &str, join_type: JoinType) -> &mut Self {
        self.join_with(table, condition, join_type, None)
    }

    /// Adds a JOIN whose table and condition are used verbatim.
    pub fn join_raw(&mut self, table: &str, condition: &str, join_type: JoinType) -> &mut Self {
        self.join_with(table, condition, join_type, Some(false))
    }

    /// Adds a JOIN with an explicit escape flag.
    pub fn join_with(
        &mut self,
        table: &str,
        condition: &str,
        join_type: JoinType,
        escape: Option<bool>,
    ) -> &mut Self {
        self.record(|c| track_aliases(&mut c.aliases, table));
        let escape = self.escape_default(escape);

        let condition = if !has_operator(condition) {
            let columns = if escape {
                escape_identifiers(self.dialect(), condition)
            } else {
                String::from(condition)
            };
            format!(" USING ({columns})")
        } else if escape {
            format!(" ON {}", self.protect_join_condition(condition))
        } else {
            format!(" ON {condition}")
        };

        let table = if escape {
            self.protect_identifiers(table, true, None, false)
        } else {
            String::from(table)
        };

        let join = format!("{}JOIN {table}{condition}", join_type.prefix());
        self.record(|c| c.join.push(join.clone()));
        self
    }

    fn protect_join_condition(&self, condition: &str) -> String {
        let mut out = String::with_capacity(condition.len() + 8);
        let mut last = 0;
        for joint in JOIN_CONJUNCTION.find_iter(condition) {
            out.push_str(&self.protect_join_term(&condition[last..joint.start()]));
            out.push_str(joint.as_str());
            last = joint.end();
        }
        out.push_str(&self.protect_join_term(&condition[last..]));
        out
    }

    /// Protects both sides of `left OP right`.
    fn protect_join_term(&self, term: &str) -> String {
        let Some(op) = find_operator(term) else {
            return String::from(term);
        };
        let pattern = format!(r"(?i)(\(*)?([\[\]\w\.'-]+){}(.*)", regex::escape(op));
        let Ok(re) = Regex::new(&pattern) else {
            return String::from(term);
        };
        match re.captures(term) {
            Some(caps) => {
                let group = |i| caps.get(i).map_or("", |m| m.as_str());
                format!(
                    "{}{}{op}{}",
                    group(1),
                    self.protect_identifiers(group(2), false, None, true),
                    self.protect_identifiers(group(3), false, None, true)
                )
            }
            None => String::from(term),
        }
    }

    /// Adds comma-separated GROUP BY fields.
    pub fn group_by(&mut self, fields: &str) -> &mut Self {
        let escape = self.escape_default(None);
        let fields: Vec<&str> = if escape {
            fields.split(',').collect()
        } else {
            vec![fields]
        };
        for field in fields.into_iter().map(str::trim).filter(|f| !f.is_empty()) {
            let item = GroupItem {
                field: String::from(field),
                escape,
            };
            self.record(|c| c.group_by.push(item.clone()));
        }
        self
    }

    /// Adds an ORDER BY.
    ///
    /// With [`OrderDirection::Random`] the field is replaced by the dialect's
    /// random keyword, seeded when the field is digits only.
    pub fn order_by(&mut self, fields: &str, direction: OrderDirection) -> &mut Self {
        self.push_order(fields, Some(direction), None)
    }

    /// Adds an ORDER BY whose fields may carry their own `ASC`/`DESC`.
    pub fn order_by_expr(&mut self, fields: &str) -> &mut Self {
        self.push_order(fields, None, None)
    }

    /// Adds an ORDER BY expression used verbatim.
    pub fn order_by_raw(&mut self, expr: &str) -> &mut Self {
        self.push_order(expr, None, Some(false))
    }

    fn push_order(
        &mut self,
        fields: &str,
        direction: Option<OrderDirection>,
        escape: Option<bool>,
    ) -> &mut Self {
        let (fields, direction) = match direction {
            Some(OrderDirection::Random) => {
                let trimmed = fields.trim();
                let seed = if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    trimmed.parse::<u64>().ok()
                } else {
                    None
                };
                (self.dialect().random_keyword(seed), "")
            }
            _ if fields.trim().is_empty() => return self,
            Some(OrderDirection::Asc) => (String::from(fields), " ASC"),
            Some(OrderDirection::Desc) => (String::from(fields), " DESC"),
            None => (String::from(fields), ""),
        };

        let escape = self.escape_default(escape);
        let items: Vec<OrderItem> = if escape {
            fields
                .split(',')
                .map(|field| {
                    let trimmed = field.trim_end();
                    match TRAILING_DIRECTION.captures(trimmed) {
                        Some(caps) if direction.is_empty() => {
                            let start = caps.get(0).map_or(trimmed.len(), |m| m.start());
                            let dir = caps.get(1).map_or("", |m| m.as_str());
                            OrderItem {
                                field: String::from(trimmed[..start].trim_start()),
                                direction: format!(" {}", dir.to_ascii_uppercase()),
                                escape: true,
                            }
                        }
                        _ => OrderItem {
                            field: String::from(field.trim()),
                            direction: String::from(direction),
                            escape: true,
                        },
                    }
                })
                .collect()
        } else {
            vec![OrderItem {
                field: fields,
                direction: String::from(direction),
                escape: false,
            }]
        };

        for item in items {
            self.record(|c| c.order_by.push(item.clone()));
        }
        self
    }

    /// Sets LIMIT.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Sets OFFSET.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub(super) fn compile_group_by(&self) -> String {
        if self.live.group_by.is_empty() {
            return String::new();
        }
        let fields: Vec<String> = self
            .live
            .group_by
            .iter()
            .map(|g| {
                if !g.escape || self.is_literal(&g.field) {
                    g.field.clone()
                } else {
                    self.protect_identifiers(&g.field, false, None, true)
                }
            })
            .collect();
        format!("\nGROUP BY {}", fields.join(", "))
    }

    pub(super) fn compile_order_by(&self) -> String {
        if self.live.order_by.is_empty() {
            return String::new();
        }
        let fields: Vec<String> = self
            .live
            .order_by
            .iter()
            .map(|o| {
                let field = if o.escape && !self.is_literal(&o.field) {
                    self.protect_identifiers(&o.field, false, None, true)
                } else {
                    o.field.clone()
                };
                format!("{field}{}", o.direction)
            })
            .collect();
        format!("\nORDER BY {}", fields.join(", "))
    }

    /// Renders the SELECT from the live state.
    ///
    /// `select_override` replaces the `SELECT ...` column list.
    fn render_select(&self, select_override: Option<&str>, include_order: bool) -> Result<String> {
        let mut sql = match select_override {
            Some(select) => String::from(select),
            None => {
                let mut sql = String::from(if self.distinct {
                    "SELECT DISTINCT "
                } else {
                    "SELECT "
                });
                if self.live.select.is_empty() {
                    sql.push('*');
                } else {
                    let columns: Vec<String> = self
                        .live
                        .select
                        .iter()
                        .map(|s| self.protect_identifiers(&s.expr, false, s.escape, true))
                        .collect();
                    sql.push_str(&columns.join(", "));
                }
                sql
            }
        };

        if !self.live.from.is_empty() {
            sql.push_str("\nFROM ");
            sql.push_str(
                &self
                    .dialect()
                    .from_tables(&self.live.from, !self.live.join.is_empty()),
            );
        }
        if !self.live.join.is_empty() {
            sql.push('\n');
            sql.push_str(&self.live.join.join("\n"));
        }

        sql.push_str(&self.compile_conditions(ClauseKind::Where)?);
        sql.push_str(&self.compile_group_by());
        sql.push_str(&self.compile_conditions(ClauseKind::Having)?);
        if include_order {
            sql.push_str(&self.compile_order_by());
        }

        if self.limit.is_some() || self.offset.is_some() {
            sql = self.dialect().limit_clause(sql, self.limit, self.offset);
        }
        Ok(sql)
    }

    /// Compiles the SELECT statement without resetting the builder.
    pub fn compile_select(&mut self) -> Result<String> {
        self.take_error()?;
        self.merge_cache();
        self.render_select(None, true)
    }

    /// Compiles the SELECT statement, optionally adding `table` to FROM.
    ///
    /// With `reset` the read-family state is cleared afterwards, even when
    /// the compile fails.
    pub fn get_compiled_select(&mut self, table: &str, reset: bool) -> Result<String> {
        if !table.is_empty() {
            self.from(table);
        }
        let sql = self.compile_select();
        if reset {
            self.reset_select();
        }
        sql
    }

    fn numrows_alias(&self) -> String {
        format!(
            "{}{}",
            self.dialect().count_string(),
            self.protect_identifiers("numrows", false, None, true)
        )
    }

    /// Compiles a statement counting the rows the current SELECT would return.
    ///
    /// ORDER BY is dropped. With DISTINCT, GROUP BY, LIMIT or OFFSET the
    /// SELECT is wrapped in a sub-select. The builder is not reset.
    pub fn compile_count_all_results(&mut self, table: &str) -> Result<String> {
        if !table.is_empty() {
            self.from(table);
        }
        self.take_error()?;
        self.merge_cache();

        let count = self.numrows_alias();
        let wrap = self.distinct
            || !self.live.group_by.is_empty()
            || self.limit.is_some()
            || self.offset.is_some_and(|o| o > 0);

        if wrap {
            let inner = self.render_select(None, false)?;
            Ok(format!("{count}\nFROM (\n{inner}\n) count_all_results"))
        } else {
            self.render_select(Some(&count), false)
        }
    }

    /// Compiles `SELECT COUNT(*) AS numrows FROM table`.
    pub fn compile_count_all(&self, table: &str) -> Result<String> {
        if table.trim().is_empty() {
            return Err(DbError::MissingTable);
        }
        Ok(format!(
            "{} FROM {}",
            self.numrows_alias(),
            self.protect_identifiers(table, true, None, false)
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::{GenericDialect, MySqlDialect, PostgresDialect, SqliteDialect};
    use crate::protect::Prefixes;

    fn mysql() -> QueryBuilder {
        QueryBuilder::new(Arc::new(MySqlDialect::new()))
    }

    #[test]
    fn test_simple_select_unquoted() {
        let mut qb = QueryBuilder::new(Arc::new(GenericDialect::unquoted()));
        qb.select("id,name").from("users").where_("age", 30);
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT id, name\nFROM users\nWHERE age = 30"
        );
    }

    #[test]
    fn test_select_star_and_distinct() {
        let mut qb = mysql();
        qb.distinct().from("users");
        assert_eq!(qb.compile_select().unwrap(), "SELECT DISTINCT *\nFROM `users`");
    }

    #[test]
    fn test_select_alias_and_raw() {
        let mut qb = mysql();
        qb.select("name AS n, u.id")
            .select_raw("COUNT(*) AS total, 1")
            .from("users u");
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT `name` AS `n`, `u`.`id`, COUNT(*) AS total, 1\nFROM `users` `u`"
        );
    }

    #[test]
    fn test_select_aggregates() {
        let mut qb = mysql();
        qb.select_max("age", None)
            .select_sum("o.total", Some("revenue"))
            .select_avg("score", Some("avg_score"))
            .select_min("t.price", None)
            .from("t");
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT MAX(`age`) AS `age`, SUM(`o`.`total`) AS `revenue`, AVG(`score`) AS `avg_score`, MIN(`t`.`price`) AS `price`\nFROM `t`"
        );
    }

    #[test]
    fn test_select_aggregate_empty_field_is_error() {
        let mut qb = mysql();
        qb.select_max(" ", None).from("t");
        assert!(matches!(qb.compile_select(), Err(DbError::InvalidQuery(_))));
    }

    #[test]
    fn test_from_multiple_with_join_is_parenthesized() {
        let mut qb = mysql();
        qb.from("a, b").join("c", "c.id = a.c_id", JoinType::Left);
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT *\nFROM (`a`, `b`)\nLEFT JOIN `c` ON `c`.`id` = `a`.`c_id`"
        );
    }

    #[test]
    fn test_join_with_prefix_and_aliases() {
        let mut qb = mysql().with_prefixes(Prefixes::new("pre_", ""));
        qb.select("u.name, o.total")
            .from("users u")
            .join("orders o", "o.user_id = u.id AND o.state = 'paid'", JoinType::Inner);
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT `u`.`name`, `o`.`total`\nFROM `pre_users` `u`\nINNER JOIN `pre_orders` `o` ON `o`.`user_id` = `u`.`id` AND `o`.`state` = 'paid'"
        );
    }

    #[test]
    fn test_join_using_and_raw() {
        let mut qb = mysql();
        qb.from("a")
            .join("b", "id", JoinType::Plain)
            .join_raw("c", "c.x = a.x", JoinType::RightOuter);
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT *\nFROM `a`\nJOIN `b` USING (`id`)\nRIGHT OUTER JOIN c ON c.x = a.x"
        );
    }

    #[test]
    fn test_group_by_having_order_limit() {
        let mut qb = mysql();
        qb.select("dept")
            .select_raw("COUNT(*) AS n")
            .from("emp")
            .where_("active", true)
            .group_by("dept, site")
            .having("n >", 3)
            .order_by("dept", OrderDirection::Desc)
            .limit(10)
            .offset(20);
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT `dept`, COUNT(*) AS n\nFROM `emp`\nWHERE `active` = 1\nGROUP BY `dept`, `site`\nHAVING `n` > 3\nORDER BY `dept` DESC\nLIMIT 20, 10"
        );
    }

    #[test]
    fn test_order_by_inline_directions() {
        let mut qb = mysql();
        qb.from("t").order_by_expr("a desc, b, c ASC");
        assert_eq!(
            qb.compile_select().unwrap(),
            "SELECT *\nFROM `t`\nORDER BY `a` DESC, `b`, `c` ASC"
        );
    }

    #[test]
    fn test_order_by_random() {
        let mut qb = mysql();
        qb.from("t").order_by("score", OrderDirection::Random);
        assert!(qb.compile_select().unwrap().ends_with("\nORDER BY RAND()"));

        let mut qb = mysql();
        qb.from("t").order_by("7", OrderDirection::Random);
        assert!(qb.compile_select().unwrap().ends_with("\nORDER BY RAND(7)"));

        let mut qb = QueryBuilder::new(Arc::new(PostgresDialect::new()));
        qb.from("t").order_by("7", OrderDirection::Random);
        assert!(qb.compile_select().unwrap().ends_with("\nORDER BY RANDOM()"));
    }

    #[test]
    fn test_order_by_empty_field_ignored() {
        let mut qb = mysql();
        qb.from("t").order_by(" ", OrderDirection::Asc);
        assert_eq!(qb.compile_select().unwrap(), "SELECT *\nFROM `t`");
    }

    #[test]
    fn test_offset_only_sqlite() {
        let mut qb = QueryBuilder::new(Arc::new(SqliteDialect::new()));
        qb.from("t").offset(5);
        assert_eq!(qb.compile_select().unwrap(), "SELECT *\nFROM \"t\"\nLIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_get_compiled_select_resets() {
        let mut qb = mysql();
        qb.select("a").where_("b", 1);
        assert_eq!(
            qb.get_compiled_select("t", true).unwrap(),
            "SELECT `a`\nFROM `t`\nWHERE `b` = 1"
        );
        assert_eq!(qb.get_compiled_select("", true).unwrap(), "SELECT *");
    }

    #[test]
    fn test_count_all_results_plain() {
        let mut qb = mysql();
        qb.where_("a", 1).order_by("b", OrderDirection::Asc);
        assert_eq!(
            qb.compile_count_all_results("t").unwrap(),
            "SELECT COUNT(*) AS `numrows`\nFROM `t`\nWHERE `a` = 1"
        );
    }

    #[test]
    fn test_count_all_results_wraps_grouped() {
        let mut qb = mysql();
        qb.select("a").group_by("a").order_by("a", OrderDirection::Asc);
        assert_eq!(
            qb.compile_count_all_results("t").unwrap(),
            "SELECT COUNT(*) AS `numrows`\nFROM (\nSELECT `a`\nFROM `t`\nGROUP BY `a`\n) count_all_results"
        );
        // ORDER BY survives for the next compile.
        assert!(qb.compile_select().unwrap().ends_with("ORDER BY `a` ASC"));
    }

    #[test]
    fn test_count_all() {
        let qb = mysql().with_prefixes(Prefixes::new("p_", ""));
        assert_eq!(
            qb.compile_count_all("users").unwrap(),
            "SELECT COUNT(*) AS `numrows` FROM `p_users`"
        );
        assert!(matches!(qb.compile_count_all(""), Err(DbError::MissingTable)));
    }
}
