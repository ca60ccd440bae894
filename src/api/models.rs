use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pie/bar colours for category slices, assigned by position.
pub const CATEGORY_PALETTE: [&str; 5] = ["#0088FE", "#00C49F", "#FFBB28", "#FF8042", "#A28AFF"];

/// Row of the stock overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    pub product_name: String,
    pub category: i64,
    pub available: i64,
    pub sold: i64,
    pub demanded: i64,
}

/// Record as served by `/api/stock/`. Anything may be missing or null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<i64>,
    #[serde(default)]
    pub available_quantity: Option<i64>,
    #[serde(default)]
    pub total_shipped: Option<i64>,
    #[serde(default)]
    pub total_required_quantity: Option<i64>,
}

impl From<StockRecord> for StockItem {
    fn from(record: StockRecord) -> Self {
        Self {
            product_name: record
                .name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            category: record.category.unwrap_or(0),
            available: record.available_quantity.unwrap_or(0),
            sold: record.total_shipped.unwrap_or(0),
            demanded: record.total_required_quantity.unwrap_or(0),
        }
    }
}

/// Projects the raw `/api/stock/` body. Anything other than an array yields
/// no rows; malformed entries fall back to the defaulted record.
pub fn project_stock(body: &Value) -> Vec<StockItem> {
    match body {
        Value::Array(records) => records
            .iter()
            .map(|record| {
                serde_json::from_value::<StockRecord>(record.clone())
                    .unwrap_or_default()
                    .into()
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryItem {
    pub category_id: i64,
    pub name: String,
    pub product_count: i64,
    pub fill: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryRecord {
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_count: i64,
}

/// Projects `{data: [...]}` from `/api/category-stock/`, colouring by index.
pub fn project_categories(body: &Value) -> Vec<CategoryItem> {
    let records: &[Value] = match body.get("data") {
        Some(Value::Array(records)) => records.as_slice(),
        _ => &[],
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let record: CategoryRecord =
                serde_json::from_value(record.clone()).unwrap_or_default();
            CategoryItem {
                category_id: record.category_id,
                name: record.name,
                product_count: record.product_count,
                fill: CATEGORY_PALETTE[index % CATEGORY_PALETTE.len()].to_string(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of `/api/token/`. On failure only `detail` is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access: Option<String>,
}
