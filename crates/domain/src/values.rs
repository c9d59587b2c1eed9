//! Value objects shared by the cart, pricing and checkout models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock-keeping unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuId(String);

impl SkuId {
    /// Creates a new SKU ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the SKU ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SkuId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SkuId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SkuId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SkuId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Variant identifier (size, colour, ...) of a SKU.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    /// Creates a new variant ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the variant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VariantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VariantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of a cart line: the `(sku, variant)` pair.
///
/// Textual form is `sku` or `sku:variant`; SKU ids therefore must not contain `:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub sku: SkuId,
    pub variant: Option<VariantId>,
}

impl LineKey {
    /// Creates a line key.
    pub fn new(sku: impl Into<SkuId>, variant: Option<VariantId>) -> Self {
        Self {
            sku: sku.into(),
            variant,
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}:{}", self.sku, variant),
            None => write!(f, "{}", self.sku),
        }
    }
}

impl std::str::FromStr for LineKey {
    type Err = InvalidLineKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sku, variant) = match s.split_once(':') {
            Some((sku, variant)) => (sku, Some(variant)),
            None => (s, None),
        };
        if sku.is_empty() || variant.is_some_and(str::is_empty) {
            return Err(InvalidLineKey(s.to_string()));
        }
        Ok(Self {
            sku: SkuId::new(sku),
            variant: variant.map(VariantId::new),
        })
    }
}

/// Returned when a line key string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid line key: {0:?}")]
pub struct InvalidLineKey(pub String);

/// Owner of a cart, supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    /// An authenticated user.
    User(String),
    /// An anonymous browsing session.
    Guest(String),
}

impl OwnerRef {
    /// Returns true for guest owners.
    pub fn is_guest(&self) -> bool {
        matches!(self, OwnerRef::Guest(_))
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerRef::User(id) => write!(f, "user:{id}"),
            OwnerRef::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}

/// Tax category of a SKU, used to look up a rate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxCategory(String);

impl TaxCategory {
    /// Creates a tax category.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The category applied when the catalog does not say otherwise.
    pub fn standard() -> Self {
        Self("standard".to_string())
    }

    /// Returns the category name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaxCategory {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A proportional rate in basis points (100 bp = 1%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    /// A zero rate.
    pub const ZERO: Rate = Rate(0);

    /// One hundred percent.
    pub const FULL: Rate = Rate(10_000);

    /// Creates a rate from basis points.
    pub fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    /// Creates a rate from whole percent.
    pub fn from_percent(percent: u32) -> Self {
        Self(percent.saturating_mul(100))
    }

    /// Returns the rate in basis points.
    pub fn basis_points(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars.saturating_mul(100),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, saturating at the representable range.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Applies a rate, rounding half away from zero to the nearest cent.
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let product = i128::from(self.cents) * i128::from(rate.basis_points());
        let half = 5_000i128 * product.signum();
        Money {
            cents: saturate((product + half) / 10_000),
        }
    }

    /// Returns `self * numerator / denominator`, truncated toward zero.
    ///
    /// Used to split an amount proportionally; a zero denominator yields zero.
    pub fn share(&self, numerator: Money, denominator: Money) -> Money {
        if denominator.cents == 0 {
            return Money::zero();
        }
        let product = i128::from(self.cents) * i128::from(numerator.cents);
        Money {
            cents: saturate(product / i128::from(denominator.cents)),
        }
    }
}

fn saturate(cents: i128) -> i64 {
    i64::try_from(cents).unwrap_or(if cents < 0 { i64::MIN } else { i64::MAX })
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_sub(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// One SKU that could not be reserved in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub sku: SkuId,
    pub requested: u64,
    pub available: u64,
}

impl std::fmt::Display for StockShortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (requested {}, available {})",
            self.sku, self.requested, self.available
        )
    }
}

/// A line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// The stock-keeping unit.
    pub sku: SkuId,

    /// Optional variant of the SKU.
    pub variant: Option<VariantId>,

    /// Quantity, always at least one.
    pub quantity: u32,

    /// Unit price captured when the line was first added.
    ///
    /// Display only; checkout reprices every line from the catalog.
    pub unit_price_snapshot: Money,

    /// When the line was first added.
    pub added_at: DateTime<Utc>,
}

impl CartLineItem {
    /// Creates a new line.
    pub fn new(
        sku: impl Into<SkuId>,
        variant: Option<VariantId>,
        quantity: u32,
        unit_price_snapshot: Money,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sku: sku.into(),
            variant,
            quantity,
            unit_price_snapshot,
            added_at,
        }
    }

    /// Returns the identity of this line.
    pub fn key(&self) -> LineKey {
        LineKey {
            sku: self.sku.clone(),
            variant: self.variant.clone(),
        }
    }

    /// Returns true if this line has the given identity.
    pub fn matches(&self, key: &LineKey) -> bool {
        self.sku == key.sku && self.variant == key.variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_id_string_conversion() {
        let id = SkuId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");

        let id2: SkuId = "SKU-002".into();
        assert_eq!(id2.as_str(), "SKU-002");
    }

    #[test]
    fn test_line_key_parse_and_display() {
        let plain: LineKey = "SKU-1".parse().unwrap();
        assert_eq!(plain, LineKey::new("SKU-1", None));
        assert_eq!(plain.to_string(), "SKU-1");

        let variant: LineKey = "SKU-1:red".parse().unwrap();
        assert_eq!(variant, LineKey::new("SKU-1", Some(VariantId::new("red"))));
        assert_eq!(variant.to_string(), "SKU-1:red");
    }

    #[test]
    fn test_line_key_rejects_empty_parts() {
        assert!("".parse::<LineKey>().is_err());
        assert!(":red".parse::<LineKey>().is_err());
        assert!("SKU-1:".parse::<LineKey>().is_err());
    }

    #[test]
    fn test_owner_ref_ordering_and_display() {
        let user = OwnerRef::User("u1".into());
        let guest = OwnerRef::Guest("g1".into());
        assert!(guest.is_guest());
        assert!(!user.is_guest());
        assert_eq!(user.to_string(), "user:u1");
        assert_eq!(guest.to_string(), "guest:g1");
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().cents(), 2000);
    }

    #[test]
    fn test_money_saturates_instead_of_overflowing() {
        let huge = Money::from_cents(i64::MAX / 2);
        assert_eq!(huge.multiply(u32::MAX).cents(), i64::MAX);
        assert_eq!((huge + huge + huge).cents(), i64::MAX);
        assert_eq!((Money::from_cents(i64::MIN) - huge).cents(), i64::MIN);
        assert_eq!(
            Money::from_cents(i64::MAX)
                .apply_rate(Rate::from_basis_points(20_000))
                .cents(),
            i64::MAX
        );

        let mut total = Money::from_cents(i64::MAX);
        total += Money::from_cents(1);
        assert_eq!(total.cents(), i64::MAX);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        assert_eq!(Money::from_cents(2000).apply_rate(Rate::from_percent(10)).cents(), 200);
        // 8.25% of 1.00 = 8.25 cents -> 8
        assert_eq!(Money::from_cents(100).apply_rate(Rate::from_basis_points(825)).cents(), 8);
        // 7.5% of 1.00 = 7.5 cents -> 8
        assert_eq!(Money::from_cents(100).apply_rate(Rate::from_basis_points(750)).cents(), 8);
        assert_eq!(Money::from_cents(999).apply_rate(Rate::ZERO).cents(), 0);
    }

    #[test]
    fn test_share_splits_proportionally() {
        let discount = Money::from_cents(300);
        let part = discount.share(Money::from_cents(1000), Money::from_cents(3000));
        assert_eq!(part.cents(), 100);
        assert_eq!(discount.share(Money::from_cents(1), Money::zero()), Money::zero());
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_percent(10).to_string(), "10.00%");
        assert_eq!(Rate::from_basis_points(825).to_string(), "8.25%");
    }

    #[test]
    fn test_cart_line_item_key() {
        let line = CartLineItem::new(
            "SKU-001",
            Some(VariantId::new("xl")),
            2,
            Money::from_cents(999),
            Utc::now(),
        );
        assert_eq!(line.key().to_string(), "SKU-001:xl");
        assert!(line.matches(&"SKU-001:xl".parse().unwrap()));
        assert!(!line.matches(&"SKU-001".parse().unwrap()));
    }

    #[test]
    fn test_cart_line_item_serialization() {
        let line = CartLineItem::new("SKU-001", None, 2, Money::from_cents(999), Utc::now());
        let json = serde_json::to_string(&line).unwrap();
        let deserialized: CartLineItem = serde_json::from_str(&json).unwrap();
        assert_eq!(line, deserialized);
    }
}
