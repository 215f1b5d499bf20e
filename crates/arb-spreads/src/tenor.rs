//! Curve tenors and the column names derived from them.

use derive_more::Display;

/// Maturity points used by the TIPS-Treasury basis.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tenor {
    /// 2-year
    #[display("2y")]
    Y2,
    /// 5-year
    #[display("5y")]
    Y5,
    /// 10-year
    #[display("10y")]
    Y10,
    /// 20-year
    #[display("20y")]
    Y20,
}

impl Tenor {
    /// All tenors, shortest first.
    pub const ALL: [Self; 4] = [Self::Y2, Self::Y5, Self::Y10, Self::Y20];

    /// Maturity in years.
    pub const fn years(self) -> u32 {
        match self {
            Self::Y2 => 2,
            Self::Y5 => 5,
            Self::Y10 => 10,
            Self::Y20 => 20,
        }
    }

    /// Fed GSW nominal zero-coupon yield, continuously compounded percent.
    pub fn sveny(self) -> String {
        format!("SVENY{:02}", self.years())
    }

    /// Fed TIPS real zero-coupon yield, continuously compounded percent.
    pub fn tipsy(self) -> String {
        format!("TIPSY{:02}", self.years())
    }

    /// Alternative names a stored nominal curve may use for [`Self::sveny`].
    pub fn sveny_aliases(self) -> Vec<String> {
        vec![self.sveny(), format!("Treasury_SF_{:02}Y", self.years())]
    }

    /// Alternative names a stored TIPS curve may use for [`Self::tipsy`].
    pub fn tipsy_aliases(self) -> Vec<String> {
        vec![self.tipsy(), format!("TIPS_Treasury_{:02}Y", self.years())]
    }

    /// Nominal zero-coupon yield, annually compounded basis points.
    pub fn nom_zc(self) -> String {
        format!("nom_zc{}", self.years())
    }

    /// Real yield as a decimal.
    pub fn real_cc(self) -> String {
        format!("real_cc{}", self.years())
    }

    /// Zero-coupon inflation swap rate as a decimal.
    pub fn inf_swap(self) -> String {
        format!("inf_swap_{}y", self.years())
    }

    /// Synthetic risk-free rate implied by TIPS plus inflation swap, basis points.
    pub fn tips_treas_rf(self) -> String {
        format!("tips_treas_{}_rf", self.years())
    }

    /// TIPS-Treasury arbitrage spread, basis points.
    pub fn arb(self) -> String {
        format!("arb_{}", self.years())
    }

    /// Missing-data indicator used while masking.
    pub(crate) fn missing_flag(self) -> String {
        format!("mi_{}", self.years())
    }
}

/// Bloomberg zero-coupon US CPI swap tickers and their column names.
pub const SWAP_TICKERS: [(&str, &str); 11] = [
    ("USSWITA BGN Curncy", "inf_swap_1m"),
    ("USSWITC BGN Curncy", "inf_swap_3m"),
    ("USSWITF BGN Curncy", "inf_swap_6m"),
    ("USSWIT1 BGN Curncy", "inf_swap_1y"),
    ("USSWIT2 BGN Curncy", "inf_swap_2y"),
    ("USSWIT3 BGN Curncy", "inf_swap_3y"),
    ("USSWIT4 BGN Curncy", "inf_swap_4y"),
    ("USSWIT5 BGN Curncy", "inf_swap_5y"),
    ("USSWIT10 BGN Curncy", "inf_swap_10y"),
    ("USSWIT20 BGN Curncy", "inf_swap_20y"),
    ("USSWIT30 BGN Curncy", "inf_swap_30y"),
];
