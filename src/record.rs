//! Raw customer records and the typed single-customer input

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute names as they appear in the Telco churn dataset
pub mod attributes {
    pub const TENURE: &str = "tenure";
    pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
    pub const TOTAL_CHARGES: &str = "TotalCharges";
    pub const CONTRACT: &str = "Contract";
    pub const INTERNET_SERVICE: &str = "InternetService";
    pub const ONLINE_SECURITY: &str = "OnlineSecurity";
    pub const TECH_SUPPORT: &str = "TechSupport";
    pub const PAYMENT_METHOD: &str = "PaymentMethod";
}

/// A single attribute value: numeric pass-through or categorical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Category(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Value::Category(c) => Some(c),
            Value::Number(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Category(c) => f.write_str(c),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(c: &str) -> Self {
        Value::Category(c.to_string())
    }
}

impl From<String> for Value {
    fn from(c: String) -> Self {
        Value::Category(c)
    }
}

/// One customer: attribute name to value. Null cells are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    attributes: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// A closed set of categories for one attribute, spelled as in the training data
pub trait CategoryValue: Copy + 'static {
    /// Attribute this enum encodes
    const ATTRIBUTE: &'static str;

    /// Every variant, in declaration order
    fn all() -> &'static [Self];

    /// Category spelling used in the dataset and therefore in dummy column names
    fn category(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ContractType {
    MonthToMonth,
    OneYear,
    TwoYear,
}

impl CategoryValue for ContractType {
    const ATTRIBUTE: &'static str = attributes::CONTRACT;

    fn all() -> &'static [Self] {
        &[Self::MonthToMonth, Self::OneYear, Self::TwoYear]
    }

    fn category(self) -> &'static str {
        match self {
            Self::MonthToMonth => "Month-to-month",
            Self::OneYear => "One year",
            Self::TwoYear => "Two year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum InternetService {
    Dsl,
    FiberOptic,
    #[value(name = "none")]
    NoService,
}

impl CategoryValue for InternetService {
    const ATTRIBUTE: &'static str = attributes::INTERNET_SERVICE;

    fn all() -> &'static [Self] {
        &[Self::Dsl, Self::FiberOptic, Self::NoService]
    }

    fn category(self) -> &'static str {
        match self {
            Self::Dsl => "DSL",
            Self::FiberOptic => "Fiber optic",
            Self::NoService => "No",
        }
    }
}

/// Online security flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum OnlineSecurity {
    Yes,
    No,
}

impl CategoryValue for OnlineSecurity {
    const ATTRIBUTE: &'static str = attributes::ONLINE_SECURITY;

    fn all() -> &'static [Self] {
        &[Self::Yes, Self::No]
    }

    fn category(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

/// Tech support flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum TechSupport {
    Yes,
    No,
}

impl CategoryValue for TechSupport {
    const ATTRIBUTE: &'static str = attributes::TECH_SUPPORT;

    fn all() -> &'static [Self] {
        &[Self::Yes, Self::No]
    }

    fn category(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

/// The automatic payment methods carry an "(automatic)" suffix in the dataset;
/// spelling them without it would silently miss the dummy column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum PaymentMethod {
    ElectronicCheck,
    MailedCheck,
    BankTransfer,
    CreditCard,
}

impl CategoryValue for PaymentMethod {
    const ATTRIBUTE: &'static str = attributes::PAYMENT_METHOD;

    fn all() -> &'static [Self] {
        &[
            Self::ElectronicCheck,
            Self::MailedCheck,
            Self::BankTransfer,
            Self::CreditCard,
        ]
    }

    fn category(self) -> &'static str {
        match self {
            Self::ElectronicCheck => "Electronic check",
            Self::MailedCheck => "Mailed check",
            Self::BankTransfer => "Bank transfer (automatic)",
            Self::CreditCard => "Credit card (automatic)",
        }
    }
}

/// The attributes collected for a single-customer prediction
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    /// Contract duration in months
    pub tenure: u32,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub contract: ContractType,
    pub internet_service: InternetService,
    pub online_security: OnlineSecurity,
    pub tech_support: TechSupport,
    pub payment_method: PaymentMethod,
}

impl CustomerProfile {
    /// Convert into a raw record using dataset spellings for every category
    pub fn to_record(&self) -> RawRecord {
        RawRecord::new()
            .with(attributes::TENURE, self.tenure)
            .with(attributes::MONTHLY_CHARGES, self.monthly_charges)
            .with(attributes::TOTAL_CHARGES, self.total_charges)
            .with(ContractType::ATTRIBUTE, self.contract.category())
            .with(InternetService::ATTRIBUTE, self.internet_service.category())
            .with(OnlineSecurity::ATTRIBUTE, self.online_security.category())
            .with(TechSupport::ATTRIBUTE, self.tech_support.category())
            .with(PaymentMethod::ATTRIBUTE, self.payment_method.category())
    }
}
