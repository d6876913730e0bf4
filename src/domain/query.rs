// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::OfferRecord;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// 已编译like模式的缓存，键为原始模式串
static LIKE_PATTERNS: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);

/// 条目查询
///
/// 跨全部缓存快照的条目过滤请求。所有条件按与连接；
/// `participant_ids`为空表示不限参与方。评估逻辑在进程内执行，
/// 与底层存储无关，保证各后端对同一查询命中相同条目。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferQuery {
    /// 过滤条件，按与连接
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    /// 限定的参与方，空表示全部
    #[serde(default)]
    pub participant_ids: Vec<String>,
    /// 排序说明
    #[serde(default)]
    pub sort: Option<SortSpec>,
    /// 返回条数上限，零表示不限
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// 跳过条数
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

impl Default for OfferQuery {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            participant_ids: Vec::new(),
            sort: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// 单个过滤条件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    /// 字段路径：`participant_id`、`id`，或`asset.…`/`policy.…`点路径
    pub field: String,
    /// 比较算子
    pub op: CriterionOp,
    /// 比较值
    pub value: Value,
}

impl Criterion {
    pub fn new(field: impl Into<String>, op: CriterionOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

/// 条件算子枚举
///
/// `like`使用`%`/`_`通配符；`contains`为子串匹配；`in`要求数组值；
/// `exists`要求布尔值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriterionOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "exists")]
    Exists,
}

impl fmt::Display for CriterionOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CriterionOp::Eq => "=",
            CriterionOp::Ne => "!=",
            CriterionOp::Gt => ">",
            CriterionOp::Gte => ">=",
            CriterionOp::Lt => "<",
            CriterionOp::Lte => "<=",
            CriterionOp::In => "in",
            CriterionOp::Like => "like",
            CriterionOp::Contains => "contains",
            CriterionOp::Exists => "exists",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CriterionOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(CriterionOp::Eq),
            "!=" => Ok(CriterionOp::Ne),
            ">" => Ok(CriterionOp::Gt),
            ">=" => Ok(CriterionOp::Gte),
            "<" => Ok(CriterionOp::Lt),
            "<=" => Ok(CriterionOp::Lte),
            "in" => Ok(CriterionOp::In),
            "like" => Ok(CriterionOp::Like),
            "contains" => Ok(CriterionOp::Contains),
            "exists" => Ok(CriterionOp::Exists),
            _ => Err(()),
        }
    }
}

/// 排序说明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    /// 排序字段路径
    pub field: String,
    /// 排序方向
    #[serde(default)]
    pub order: SortOrder,
}

/// 排序方向枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// 判断一条记录是否满足全部条件
///
/// # 参数
///
/// * `record` - 待评估的条目记录
/// * `query` - 查询
///
/// # 返回值
///
/// 参与方限定与全部条件均满足则返回true
pub fn matches_record(record: &OfferRecord, query: &OfferQuery) -> bool {
    if !query.participant_ids.is_empty()
        && !query
            .participant_ids
            .iter()
            .any(|p| p == &record.participant_id)
    {
        return false;
    }
    query.criteria.iter().all(|c| matches_criterion(record, c))
}

/// 对一批记录应用完整查询：过滤、排序、偏移与截断
pub fn apply(mut records: Vec<OfferRecord>, query: &OfferQuery) -> Vec<OfferRecord> {
    records.retain(|r| matches_record(r, query));

    if let Some(sort) = &query.sort {
        records.sort_by(|a, b| {
            let va = field_value(a, &sort.field);
            let vb = field_value(b, &sort.field);
            let ord = match (va, vb) {
                (Some(x), Some(y)) => compare_values(&x, &y).unwrap_or(Ordering::Equal),
                // 缺失排序字段的记录排在最后
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            match sort.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    let offset = query.offset.min(records.len() as u64) as usize;
    let mut out: Vec<OfferRecord> = records.into_iter().skip(offset).collect();
    if query.limit > 0 {
        out.truncate(query.limit as usize);
    }
    out
}

fn matches_criterion(record: &OfferRecord, criterion: &Criterion) -> bool {
    let value = field_value(record, &criterion.field);

    if criterion.op == CriterionOp::Exists {
        let wanted = criterion.value.as_bool().unwrap_or(true);
        return value.is_some() == wanted;
    }

    let Some(value) = value else {
        return false;
    };

    match criterion.op {
        CriterionOp::Eq => values_equal(&value, &criterion.value),
        CriterionOp::Ne => !values_equal(&value, &criterion.value),
        CriterionOp::Gt => {
            compare_values(&value, &criterion.value) == Some(Ordering::Greater)
        }
        CriterionOp::Gte => matches!(
            compare_values(&value, &criterion.value),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        CriterionOp::Lt => compare_values(&value, &criterion.value) == Some(Ordering::Less),
        CriterionOp::Lte => matches!(
            compare_values(&value, &criterion.value),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        CriterionOp::In => criterion
            .value
            .as_array()
            .map(|arr| arr.iter().any(|v| values_equal(&value, v)))
            .unwrap_or(false),
        CriterionOp::Like => match (value.as_str(), criterion.value.as_str()) {
            (Some(s), Some(pattern)) => like_regex(pattern).is_match(s),
            _ => false,
        },
        CriterionOp::Contains => match (value.as_str(), criterion.value.as_str()) {
            (Some(s), Some(needle)) => s.contains(needle),
            _ => false,
        },
        CriterionOp::Exists => unreachable!("handled above"),
    }
}

/// 解析字段路径
///
/// `participant_id`与`id`为合成字段；其余路径以`asset`或`policy`
/// 开头，逐段下钻对应的JSON文档。
fn field_value(record: &OfferRecord, path: &str) -> Option<Value> {
    match path {
        "participant_id" => return Some(Value::String(record.participant_id.clone())),
        "id" => return Some(Value::String(record.offer.id.clone())),
        _ => {}
    }

    let mut segments = path.split('.');
    let root = match segments.next()? {
        "asset" => &record.offer.asset,
        "policy" => &record.offer.policy,
        _ => return None,
    };

    let mut current = root;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

/// 数值按数值比较，其余按JSON相等比较
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// 把like模式编译为锚定正则并缓存
///
/// `%`匹配任意序列，`_`匹配单个字符，其余字符按字面转义。
fn like_regex(pattern: &str) -> Regex {
    if let Some(re) = LIKE_PATTERNS.get(pattern) {
        return re.clone();
    }
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    // 模式中的特殊字符已全部转义，编译不会失败
    let re = Regex::new(&expr).unwrap_or_else(|_| Regex::new("^$").unwrap());
    LIKE_PATTERNS.insert(pattern.to_string(), re.clone());
    re
}
