// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::{CatalogSnapshot, Offer};
use crate::engines::traits::RawCatalog;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use thiserror::Error;

/// 当前接受的目录协议版本
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["dataspace-protocol-http", "dataspace-protocol-http:2024-1"];

/// 规整错误类型
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// 目录文档不符合约定形状
    #[error("Malformed catalog: {0}")]
    MalformedCatalog(String),
    /// 文档声明了不支持的协议版本
    #[error("Unsupported protocol version: {0}")]
    UnsupportedProtocolVersion(String),
}

/// 目录规整服务
///
/// 把抓取到的原始目录文档转换为不可变快照。纯计算，无任何I/O，
/// 同一输入在任何进程中产生字节相同的快照与哈希。
pub struct CatalogNormalizer;

impl CatalogNormalizer {
    /// 规整一份原始目录文档
    ///
    /// 文档必须是JSON对象；条目取自`dcat:dataset`（数组、单个对象
    /// 或缺失，缺失视为空目录）。每个条目需要字符串`@id`和
    /// `odrl:hasPolicy`；同一文档内条目标识不得重复。
    ///
    /// # 参数
    ///
    /// * `raw` - 抓取到的原始目录
    /// * `participant_id` - 快照归属的参与方
    /// * `fetched_at` - 抓取时间
    ///
    /// # 返回值
    ///
    /// * `Ok(CatalogSnapshot)` - 规整后的快照
    /// * `Err(NormalizeError)` - 文档不合法或协议版本不受支持
    pub fn normalize(
        raw: &RawCatalog,
        participant_id: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<CatalogSnapshot, NormalizeError> {
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&raw.protocol_version.as_str()) {
            return Err(NormalizeError::UnsupportedProtocolVersion(
                raw.protocol_version.clone(),
            ));
        }

        let document = raw
            .document
            .as_object()
            .ok_or_else(|| NormalizeError::MalformedCatalog("document is not an object".into()))?;

        let datasets: Vec<&Value> = match document.get("dcat:dataset") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            // JSON-LD压缩会把单元素数组折叠成对象
            Some(single @ Value::Object(_)) => vec![single],
            Some(other) => {
                return Err(NormalizeError::MalformedCatalog(format!(
                    "dcat:dataset has unexpected type: {}",
                    type_name(other)
                )))
            }
        };

        let mut seen = BTreeSet::new();
        let mut offers = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let entry = dataset.as_object().ok_or_else(|| {
                NormalizeError::MalformedCatalog("dataset is not an object".into())
            })?;
            let id = entry
                .get("@id")
                .and_then(Value::as_str)
                .ok_or_else(|| NormalizeError::MalformedCatalog("dataset missing @id".into()))?;
            let policy = entry.get("odrl:hasPolicy").cloned().ok_or_else(|| {
                NormalizeError::MalformedCatalog(format!("dataset {} missing odrl:hasPolicy", id))
            })?;
            if !seen.insert(id.to_string()) {
                return Err(NormalizeError::MalformedCatalog(format!(
                    "duplicate offer id: {}",
                    id
                )));
            }
            // 资产描述是去掉策略后的条目本身
            let mut asset = entry.clone();
            asset.remove("odrl:hasPolicy");
            offers.push(Offer {
                id: id.to_string(),
                asset: Value::Object(asset),
                policy,
            });
        }

        let content_hash = Self::content_hash(&offers);
        Ok(CatalogSnapshot {
            participant_id: participant_id.to_string(),
            offers,
            content_hash,
            protocol_version: raw.protocol_version.clone(),
            fetched_at: fetched_at.into(),
        })
    }

    /// 计算顺序无关的内容哈希
    ///
    /// 对每个条目的规范JSON（键递归排序、无多余空白）取sha256，
    /// 把各条目摘要排序后拼接再取一次sha256。条目顺序不同但内容
    /// 相同的两份目录哈希一致；任一条目的资产或策略变化都会改变
    /// 哈希。
    pub fn content_hash(offers: &[Offer]) -> String {
        let mut digests: Vec<[u8; 32]> = offers
            .iter()
            .map(|offer| {
                let mut canonical = String::new();
                canonical.push('{');
                canonical.push_str("\"asset\":");
                write_canonical(&offer.asset, &mut canonical);
                canonical.push_str(",\"id\":");
                write_canonical(&Value::String(offer.id.clone()), &mut canonical);
                canonical.push_str(",\"policy\":");
                write_canonical(&offer.policy, &mut canonical);
                canonical.push('}');
                Sha256::digest(canonical.as_bytes()).into()
            })
            .collect();
        digests.sort_unstable();

        let mut hasher = Sha256::new();
        for digest in &digests {
            hasher.update(digest);
        }
        hex::encode(hasher.finalize())
    }
}

/// 把JSON值写成规范形式：对象键按字典序、无多余空白
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // 标量的serde序列化已经是规范形式
        other => out.push_str(&serde_json::to_string(other).unwrap_or_default()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
