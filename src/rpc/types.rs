use serde::Deserialize;

/// Response from payment_queryInfo RPC call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeDispatchInfo {
    pub partial_fee: Balance,
}

/// Balance as nodes encode it: decimal string, hex string or plain number
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Balance {
    Number(u64),
    Text(String),
}

impl Balance {
    /// Decimal rendering, `None` when the text is not a number
    pub fn to_decimal(&self) -> Option<String> {
        match self {
            Balance::Number(n) => Some(n.to_string()),
            Balance::Text(s) if s.starts_with("0x") => {
                u128::from_str_radix(s.trim_start_matches("0x"), 16)
                    .ok()
                    .map(|n| n.to_string())
            }
            Balance::Text(s) => s.parse::<u128>().ok().map(|n| n.to_string()),
        }
    }
}
