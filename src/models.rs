use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Catalog Enums ============

/// Category of a loan product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Personal,
    Education,
    Home,
    Vehicle,
    CreditLine,
    DebtConsolidation,
}

impl LoanType {
    /// Wire name, identical to the database enum value.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanType::Personal => "personal",
            LoanType::Education => "education",
            LoanType::Home => "home",
            LoanType::Vehicle => "vehicle",
            LoanType::CreditLine => "credit_line",
            LoanType::DebtConsolidation => "debt_consolidation",
        }
    }
}

impl FromStr for LoanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(LoanType::Personal),
            "education" => Ok(LoanType::Education),
            "home" => Ok(LoanType::Home),
            "vehicle" => Ok(LoanType::Vehicle),
            "credit_line" => Ok(LoanType::CreditLine),
            "debt_consolidation" => Ok(LoanType::DebtConsolidation),
            other => Err(format!("unknown loan type '{}'", other)),
        }
    }
}

impl fmt::Display for LoanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How quickly the lender pays out after approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursalSpeed {
    #[default]
    Standard,
    Fast,
    Instant,
    Slow,
}

impl DisbursalSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbursalSpeed::Standard => "standard",
            DisbursalSpeed::Fast => "fast",
            DisbursalSpeed::Instant => "instant",
            DisbursalSpeed::Slow => "slow",
        }
    }

    /// True for `fast` and `instant`.
    pub fn is_quick(&self) -> bool {
        matches!(self, DisbursalSpeed::Fast | DisbursalSpeed::Instant)
    }
}

impl FromStr for DisbursalSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(DisbursalSpeed::Standard),
            "fast" => Ok(DisbursalSpeed::Fast),
            "instant" => Ok(DisbursalSpeed::Instant),
            "slow" => Ok(DisbursalSpeed::Slow),
            other => Err(format!("unknown disbursal speed '{}'", other)),
        }
    }
}

/// Amount of paperwork the lender asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocsLevel {
    #[default]
    Standard,
    Low,
    Minimal,
}

impl DocsLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocsLevel::Standard => "standard",
            DocsLevel::Low => "low",
            DocsLevel::Minimal => "minimal",
        }
    }
}

impl FromStr for DocsLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(DocsLevel::Standard),
            "low" => Ok(DocsLevel::Low),
            "minimal" => Ok(DocsLevel::Minimal),
            other => Err(format!("unknown docs level '{}'", other)),
        }
    }
}

// ============ Catalog Models ============

/// A single FAQ entry attached to a product. Stored as `{q, a}` JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    #[serde(rename = "q", alias = "question")]
    pub question: String,
    #[serde(rename = "a", alias = "answer")]
    pub answer: String,
}

fn default_tenure_min() -> i32 {
    6
}

fn default_tenure_max() -> i32 {
    60
}

fn default_true() -> bool {
    true
}

/// A loan product from the catalog.
///
/// Scoring, prompt building, citation extraction and badge derivation only
/// ever borrow a `Product`; the storage layer owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub bank: String,
    pub loan_type: LoanType,
    /// Annual percentage rate, strictly positive.
    pub rate_apr: f64,
    pub min_income: f64,
    pub min_credit_score: i32,
    #[serde(default = "default_tenure_min")]
    pub tenure_min_months: i32,
    #[serde(default = "default_tenure_max")]
    pub tenure_max_months: i32,
    #[serde(default)]
    pub processing_fee_pct: f64,
    #[serde(default = "default_true")]
    pub prepayment_allowed: bool,
    #[serde(default)]
    pub disbursal_speed: DisbursalSpeed,
    #[serde(default)]
    pub docs_level: DocsLevel,
    #[serde(default)]
    pub limited_offer: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub faq: Vec<FaqItem>,
    #[serde(default)]
    pub terms: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Every attribute name a `Product` exposes, in declaration order.
pub const PRODUCT_FIELDS: &[&str] = &[
    "id",
    "name",
    "bank",
    "loan_type",
    "rate_apr",
    "min_income",
    "min_credit_score",
    "tenure_min_months",
    "tenure_max_months",
    "processing_fee_pct",
    "prepayment_allowed",
    "disbursal_speed",
    "docs_level",
    "limited_offer",
    "summary",
    "faq",
    "terms",
    "created_at",
];

impl Product {
    /// Returns the JSON value of the named attribute, or `None` when the
    /// product has no attribute by that name.
    pub fn field_value(&self, field: &str) -> Option<Value> {
        let value = match field {
            "id" => json!(self.id),
            "name" => json!(self.name),
            "bank" => json!(self.bank),
            "loan_type" => json!(self.loan_type),
            "rate_apr" => json!(self.rate_apr),
            "min_income" => json!(self.min_income),
            "min_credit_score" => json!(self.min_credit_score),
            "tenure_min_months" => json!(self.tenure_min_months),
            "tenure_max_months" => json!(self.tenure_max_months),
            "processing_fee_pct" => json!(self.processing_fee_pct),
            "prepayment_allowed" => json!(self.prepayment_allowed),
            "disbursal_speed" => json!(self.disbursal_speed),
            "docs_level" => json!(self.docs_level),
            "limited_offer" => json!(self.limited_offer),
            "summary" => json!(self.summary),
            "faq" => json!(self.faq),
            "terms" => Value::Object(self.terms.clone()),
            "created_at" => json!(self.created_at),
            _ => return None,
        };
        Some(value)
    }

    /// Checks the same constraints enforced on creation.
    pub fn validate(&self) -> Result<(), String> {
        validate_catalog_fields(CatalogFields {
            name: &self.name,
            bank: &self.bank,
            rate_apr: self.rate_apr,
            min_income: self.min_income,
            min_credit_score: self.min_credit_score,
            tenure_min_months: self.tenure_min_months,
            tenure_max_months: self.tenure_max_months,
            processing_fee_pct: self.processing_fee_pct,
            faq: &self.faq,
        })
    }
}

/// Payload for creating a product. The database assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub bank: String,
    pub loan_type: LoanType,
    pub rate_apr: f64,
    pub min_income: f64,
    pub min_credit_score: i32,
    #[serde(default = "default_tenure_min")]
    pub tenure_min_months: i32,
    #[serde(default = "default_tenure_max")]
    pub tenure_max_months: i32,
    #[serde(default)]
    pub processing_fee_pct: f64,
    #[serde(default = "default_true")]
    pub prepayment_allowed: bool,
    #[serde(default)]
    pub disbursal_speed: DisbursalSpeed,
    #[serde(default)]
    pub docs_level: DocsLevel,
    #[serde(default)]
    pub limited_offer: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub faq: Vec<FaqItem>,
    #[serde(default)]
    pub terms: Map<String, Value>,
}

impl ProductCreate {
    pub fn validate(&self) -> Result<(), String> {
        validate_catalog_fields(CatalogFields {
            name: &self.name,
            bank: &self.bank,
            rate_apr: self.rate_apr,
            min_income: self.min_income,
            min_credit_score: self.min_credit_score,
            tenure_min_months: self.tenure_min_months,
            tenure_max_months: self.tenure_max_months,
            processing_fee_pct: self.processing_fee_pct,
            faq: &self.faq,
        })
    }
}

struct CatalogFields<'a> {
    name: &'a str,
    bank: &'a str,
    rate_apr: f64,
    min_income: f64,
    min_credit_score: i32,
    tenure_min_months: i32,
    tenure_max_months: i32,
    processing_fee_pct: f64,
    faq: &'a [FaqItem],
}

fn validate_catalog_fields(fields: CatalogFields<'_>) -> Result<(), String> {
    if fields.name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if fields.bank.trim().is_empty() {
        return Err("bank must not be empty".to_string());
    }
    if !fields.rate_apr.is_finite() || fields.rate_apr <= 0.0 {
        return Err(format!("rate_apr must be > 0, got {}", fields.rate_apr));
    }
    if !fields.min_income.is_finite() || fields.min_income < 0.0 {
        return Err(format!("min_income must be >= 0, got {}", fields.min_income));
    }
    if fields.min_credit_score < 0 {
        return Err(format!(
            "min_credit_score must be >= 0, got {}",
            fields.min_credit_score
        ));
    }
    if fields.tenure_min_months < 0 || fields.tenure_max_months < 0 {
        return Err("tenure months must be >= 0".to_string());
    }
    if !fields.processing_fee_pct.is_finite() || fields.processing_fee_pct < 0.0 {
        return Err(format!(
            "processing_fee_pct must be >= 0, got {}",
            fields.processing_fee_pct
        ));
    }
    if let Some(pos) = fields.faq.iter().position(|f| f.question.is_empty()) {
        return Err(format!("faq[{}] has an empty question", pos));
    }
    Ok(())
}

// ============ Matching Models ============

/// Borrower profile supplied per request; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub income: f64,
    pub credit_score: i32,
    /// Compared against `LoanType::as_str()` of each product.
    pub loan_type: String,
    #[serde(default)]
    pub urgency: String,
}

/// A product paired with its match score for one profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredProduct {
    #[serde(flatten)]
    pub product: Product,
    pub score: f64,
}

/// Product as returned by the catalog endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ProductCard {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub badges: Vec<String>,
}

// ============ Chat Models ============

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role '{}'", other)),
        }
    }
}

/// One prior turn of the conversation, as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// A chat message as shown to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Row of `ai_chat_messages`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredChatMessage {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub anon_id: Option<String>,
    pub product_id: Option<Uuid>,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StoredChatMessage> for ChatMessage {
    type Error = String;

    fn try_from(row: StoredChatMessage) -> Result<Self, Self::Error> {
        Ok(ChatMessage {
            id: row.id,
            role: row.role.parse()?,
            content: row.content,
            created_at: row.created_at,
            pending: None,
            error: None,
        })
    }
}

/// Message to append to the chat log.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub user_id: Option<Uuid>,
    pub anon_id: Option<String>,
    pub product_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub ip_address: String,
}

/// Structured pointer from an answer back to the product field it used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub field: String,
    pub value: Value,
}

// ============ API Models ============

/// Query parameters for `GET /api/v1/products`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQueryParams {
    pub bank: Option<String>,
    #[serde(rename = "type")]
    pub loan_type: Option<String>,
    pub apr_min: Option<f64>,
    pub apr_max: Option<f64>,
    pub min_income: Option<f64>,
    pub min_credit_score: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Validated, storage-ready catalog filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductFilter {
    pub bank: Option<String>,
    pub loan_type: Option<LoanType>,
    pub apr_min: Option<f64>,
    pub apr_max: Option<f64>,
    pub min_income: Option<f64>,
    pub min_credit_score: Option<i32>,
    pub limit: i64,
    pub offset: i64,
}

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

impl ProductQueryParams {
    /// Converts raw query parameters into a filter, rejecting bad values.
    pub fn into_filter(self) -> Result<ProductFilter, String> {
        let loan_type = self
            .loan_type
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.parse::<LoanType>())
            .transpose()?;

        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(format!("limit must be between 1 and {}", MAX_PAGE_SIZE));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err("offset must be >= 0".to_string());
        }

        Ok(ProductFilter {
            bank: self.bank.filter(|b| !b.trim().is_empty()),
            loan_type,
            apr_min: self.apr_min,
            apr_max: self.apr_max,
            min_income: self.min_income,
            min_credit_score: self.min_credit_score,
            limit,
            offset,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductCard>,
    pub total: i64,
}

/// Body of `POST /api/v1/products/matches`.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub profile: UserProfile,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub matches: Vec<ProductCard>,
}

/// Body of `POST /api/v1/ai/ask`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub product_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub anon_id: Option<String>,
}

/// Grounded answer returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub fallback: bool,
}

/// Query parameters for `GET /api/v1/chat/history`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryQuery {
    pub product_id: Option<Uuid>,
    pub anon_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
}

/// Body of `POST /api/v1/auth/merge-anon`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAnonRequest {
    pub anon_id: Option<String>,
}
