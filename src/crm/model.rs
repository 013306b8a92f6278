use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveStatus {
    #[default]
    Active,
    Inactive,
}

impl ActiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveStatus::Active => "active",
            ActiveStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ActiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActiveStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ActiveStatus::Active),
            "inactive" => Ok(ActiveStatus::Inactive),
            other => Err(format!("unknown active status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: i64,
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub credit: f64,
    pub active_status: ActiveStatus,
}

/// Fields of a customer before the database assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub credit: f64,
    pub active_status: ActiveStatus,
}

impl Customer {
    /// Multi-line summary handed back to the agent by the CRM tools.
    pub fn describe(&self) -> String {
        format!(
            "Business Client ID: {}\nName: {}\nAddress: {}\nEmail: {}\nPhone: {}\nCredit: {}\nStatus: {}",
            self.customer_id,
            self.name,
            self.address,
            self.email,
            self.phone,
            format_credit(self.credit),
            self.active_status
        )
    }
}

/// Renders an amount as rupees with comma thousands separators and two
/// decimals, e.g. `₹12,345.67`.
pub fn format_credit(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}₹{}.{:02}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_grouping() {
        assert_eq!(format_credit(0.0), "₹0.00");
        assert_eq!(format_credit(999.5), "₹999.50");
        assert_eq!(format_credit(12345.678), "₹12,345.68");
        assert_eq!(format_credit(1_000_000.0), "₹1,000,000.00");
        assert_eq!(format_credit(-42.1), "-₹42.10");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("ACTIVE".parse::<ActiveStatus>(), Ok(ActiveStatus::Active));
        assert_eq!(" inactive ".parse::<ActiveStatus>(), Ok(ActiveStatus::Inactive));
        assert!("paused".parse::<ActiveStatus>().is_err());
    }

    #[test]
    fn describe_lists_every_field() {
        let customer = Customer {
            customer_id: 7,
            name: "Aarav Sharma".into(),
            address: "12, MG Road, Indiranagar, Bengaluru, Karnataka - 560038".into(),
            email: "aarav.sharma7@gmail.com".into(),
            phone: "+919812345678".into(),
            credit: 45210.5,
            active_status: ActiveStatus::Inactive,
        };
        let text = customer.describe();
        assert!(text.starts_with("Business Client ID: 7\nName: Aarav Sharma\n"));
        assert!(text.contains("Credit: ₹45,210.50"));
        assert!(text.ends_with("Status: inactive"));
    }
}
