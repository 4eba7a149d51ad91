//! Display helpers shared by every table and dialog.
//!
//! These are render-time conversions only; nothing here is ever sent back to
//! the API.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Cents;

/// Format an amount of cents as dollars (`12345` -> `$123.45`).
#[must_use]
pub fn format_cents(cents: Cents) -> String {
    cents.to_string()
}

/// Provider prefixes that leak into raw service codes.
static PROVIDER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:shipentegra|se|moogship)[-_\s]+").expect("Invalid regex")
});

/// Separators inside a service code.
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\s]+").expect("Invalid regex"));

/// Known service codes and their customer-facing names, first match wins.
static SERVICE_NAMES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^ups[-_\s]*(?:ekspres+|express)", "MoogShip UPS Express"),
        (r"^ups", "MoogShip UPS Standard"),
        (r"^dhl[-_\s]*e[-_\s]*commerce", "MoogShip DHL E-Commerce"),
        (r"^dhl", "MoogShip DHL Express"),
        (r"^fedex", "MoogShip FedEx"),
        (r"^(?:widect|eco)", "MoogShip-Eco"),
        (r"^aramex", "MoogShip Aramex"),
        (r"^(?:ths|express|ekspres)", "MoogShip Express"),
    ]
    .into_iter()
    .map(|(pattern, name)| (Regex::new(pattern).expect("Invalid regex"), name))
    .collect()
});

/// Map a raw service code to the name customers see.
///
/// ```
/// use moogship_core::format::normalize_service_name;
///
/// assert_eq!(normalize_service_name("shipentegra-ups-ekspress"), "MoogShip UPS Express");
/// assert_eq!(normalize_service_name("shipentegra-widect"), "MoogShip-Eco");
/// assert_eq!(normalize_service_name("royal_mail_tracked"), "Royal Mail Tracked");
/// ```
#[must_use]
pub fn normalize_service_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return "Standard".to_string();
    }
    let code = PROVIDER_PREFIX_RE.replace(&lowered, "");

    if let Some((_, name)) = SERVICE_NAMES.iter().find(|(re, _)| re.is_match(&code)) {
        return (*name).to_string();
    }

    SEPARATOR_RE
        .split(&code)
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Carriers with a public tracking page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Ups,
    Dhl,
    Fedex,
    Usps,
    Tnt,
    Aramex,
    Gls,
    RoyalMail,
    Ptt,
}

impl Carrier {
    /// Detect the carrier from a free-form carrier or service name.
    #[must_use]
    pub fn detect(name: &str) -> Option<Self> {
        let n = name.to_lowercase();
        // Order matters: "royal mail" and "ptt" before shorter substrings.
        if n.contains("royal") {
            Some(Self::RoyalMail)
        } else if n.contains("ptt") {
            Some(Self::Ptt)
        } else if n.contains("ups") {
            Some(Self::Ups)
        } else if n.contains("dhl") {
            Some(Self::Dhl)
        } else if n.contains("fedex") {
            Some(Self::Fedex)
        } else if n.contains("usps") {
            Some(Self::Usps)
        } else if n.contains("tnt") {
            Some(Self::Tnt)
        } else if n.contains("aramex") {
            Some(Self::Aramex)
        } else if n.contains("gls") {
            Some(Self::Gls)
        } else {
            None
        }
    }

    /// Public tracking page for a tracking number.
    #[must_use]
    pub fn tracking_url(self, number: &str) -> String {
        let n = urlencoding::encode(number.trim());
        match self {
            Self::Ups => format!("https://www.ups.com/track?tracknum={n}"),
            Self::Dhl => format!(
                "https://www.dhl.com/global-en/home/tracking/tracking-express.html?tracking-id={n}"
            ),
            Self::Fedex => format!("https://www.fedex.com/fedextrack/?trknbr={n}"),
            Self::Usps => format!("https://tools.usps.com/go/TrackConfirmAction?tLabels={n}"),
            Self::Tnt => format!("https://www.tnt.com/express/en_gc/site/tracking.html?searchType=con&cons={n}"),
            Self::Aramex => format!("https://www.aramex.com/track/results?ShipmentNumber={n}"),
            Self::Gls => format!("https://gls-group.com/track/{n}"),
            Self::RoyalMail => format!("https://www.royalmail.com/track-your-item#/tracking-results/{n}"),
            Self::Ptt => format!("https://gonderitakip.ptt.gov.tr/Track/Verify?q={n}"),
        }
    }
}

/// Tracking page URL for a carrier name and tracking number, if the carrier
/// is recognised.
#[must_use]
pub fn tracking_url(carrier: &str, number: &str) -> Option<String> {
    if number.trim().is_empty() {
        return None;
    }
    Carrier::detect(carrier).map(|c| c.tracking_url(number))
}
