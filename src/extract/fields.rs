//! Field Parsers
//!
//! Pure conversions from located raw text to typed values. Every parser
//! returns `None` when the text does not have the expected shape; callers keep
//! the raw text where the record has a slot for it.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([0-9][0-9,]*)").expect("valid price regex"));

static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid integer regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9][0-9,]*(?:\.[0-9]+)?").expect("valid number regex"));

static TRAILING_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?([0-9]+)/?$").expect("valid trailing digits regex"));

/// Parses the first `$` amount, e.g. `"Offers over $1,250,000"` -> 1250000
pub fn parse_price(text: &str) -> Option<i64> {
    let captures = PRICE_RE.captures(text)?;
    let digits: String = captures[1].chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

/// Components of a "street, suburb STATE POSTCODE" address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
}

/// Splits a combined address on its first comma
///
/// The location part is tokenized on whitespace: the last two tokens are the
/// state and postcode and everything before them is the suburb. With only two
/// tokens the suburb stays `None`. Without a comma nothing is decomposed.
pub fn parse_address(full: &str) -> AddressParts {
    let Some((street, location)) = full.split_once(',') else {
        return AddressParts::default();
    };

    let street = street.trim();
    let tokens: Vec<&str> = location.split_whitespace().collect();

    let mut parts = AddressParts {
        address: (!street.is_empty()).then(|| street.to_string()),
        ..AddressParts::default()
    };

    if tokens.len() >= 2 {
        let n = tokens.len();
        parts.state = Some(tokens[n - 2].trim_matches(',').to_string());
        parts.postcode = Some(tokens[n - 1].trim_matches(',').to_string());
        if n >= 3 {
            parts.suburb = Some(tokens[..n - 2].join(" ").trim_matches(',').to_string());
        }
    }

    parts
}

/// Parses a locality line shown apart from the street
///
/// `"Kirwan, QLD 4817"` splits on the comma into suburb, then state and
/// postcode. `"Kirwan QLD 4817"` takes the last two tokens as state and
/// postcode. The street address is never set.
pub fn parse_locality(text: &str) -> AddressParts {
    match text.split_once(',') {
        Some((suburb, rest)) => {
            let suburb = suburb.trim();
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            let mut parts = AddressParts {
                suburb: (!suburb.is_empty()).then(|| suburb.to_string()),
                ..AddressParts::default()
            };
            if tokens.len() >= 2 {
                parts.state = Some(tokens[0].to_string());
                parts.postcode = Some(tokens[1].to_string());
            }
            parts
        }
        None => {
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let n = tokens.len();
            if n < 3 {
                return AddressParts::default();
            }
            AddressParts {
                address: None,
                suburb: Some(tokens[..n - 2].join(" ")),
                state: Some(tokens[n - 2].to_string()),
                postcode: Some(tokens[n - 1].to_string()),
            }
        }
    }
}

impl AddressParts {
    /// Joins the parts back into "street, suburb STATE POSTCODE"
    pub fn to_full_address(&self) -> Option<String> {
        let locality = [&self.suburb, &self.state, &self.postcode]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        match (&self.address, locality.is_empty()) {
            (Some(street), false) => Some(format!("{}, {}", street, locality)),
            (Some(street), true) => Some(street.clone()),
            (None, false) => Some(locality),
            (None, true) => None,
        }
    }
}

/// First integer token, e.g. `"4 Beds"` -> 4
pub fn parse_count(text: &str) -> Option<u32> {
    INTEGER_RE.find(text)?.as_str().parse().ok()
}

/// First number with thousands separators removed, e.g. `"1,012m²"` -> 1012
///
/// Fractional areas are truncated.
pub fn parse_area(text: &str) -> Option<u32> {
    let number: String = NUMBER_RE
        .find(text)?
        .as_str()
        .chars()
        .filter(|c| *c != ',')
        .collect();

    let whole = number.split('.').next()?;
    whole.parse().ok()
}

/// Listing id from the URL path
///
/// With `pattern`, the first capture group of a match on the path wins.
/// Otherwise the trailing digits of the path are used.
pub fn listing_id_from_url(url: &Url, pattern: Option<&Regex>) -> Option<String> {
    let path = url.path();

    let captured = match pattern {
        Some(pattern) => pattern.captures(path)?.get(1)?.as_str().to_string(),
        None => TRAILING_DIGITS_RE.captures(path)?.get(1)?.as_str().to_string(),
    };

    (!captured.is_empty()).then_some(captured)
}
