//! Demo merchant catalog
//!
//! Each merchant can have several product or collection pages. A merchant
//! verification visits the first one.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Merchant short names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Merchant {
    /// FakeStore API demo
    #[value(name = "fake-store")]
    #[serde(rename = "fake-store")]
    FakeStore,
    /// SauceDemo
    #[value(name = "sauce-demo")]
    #[serde(rename = "sauce-demo")]
    SauceDemo,
    /// OpenCart demo shop
    #[value(name = "opencart-demo")]
    #[serde(rename = "opencart-demo")]
    OpenCartDemo,
    /// Generic e-commerce demo 1
    #[value(name = "ecom-demo-1")]
    #[serde(rename = "ecom-demo-1")]
    EcomDemo1,
    /// Generic e-commerce demo 2
    #[value(name = "ecom-demo-2")]
    #[serde(rename = "ecom-demo-2")]
    EcomDemo2,
}

/// One page belonging to a merchant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerchantUrl {
    /// Owning merchant
    pub merchant: Merchant,
    /// Absolute page URL
    pub url: &'static str,
}

/// Every known merchant page, grouped by merchant
pub const MERCHANT_URLS: [MerchantUrl; 9] = [
    MerchantUrl {
        merchant: Merchant::FakeStore,
        url: "https://fakestoreapi.com/products/1",
    },
    MerchantUrl {
        merchant: Merchant::FakeStore,
        url: "https://fakestoreapi.com/products/2",
    },
    MerchantUrl {
        merchant: Merchant::SauceDemo,
        url: "https://www.saucedemo.com/inventory.html",
    },
    MerchantUrl {
        merchant: Merchant::OpenCartDemo,
        url: "https://demo.opencart.com/index.php?route=product/product&product_id=43",
    },
    MerchantUrl {
        merchant: Merchant::OpenCartDemo,
        url: "https://demo.opencart.com/index.php?route=product/category&path=20",
    },
    MerchantUrl {
        merchant: Merchant::EcomDemo1,
        url: "https://www.demoblaze.com/prod.html?idp_=1",
    },
    MerchantUrl {
        merchant: Merchant::EcomDemo1,
        url: "https://www.demoblaze.com/prod.html?idp_=2",
    },
    MerchantUrl {
        merchant: Merchant::EcomDemo2,
        url: "https://automationteststore.com/index.php?rt=product/product&product_id=68",
    },
    MerchantUrl {
        merchant: Merchant::EcomDemo2,
        url: "https://automationteststore.com/index.php?rt=product/product&product_id=70",
    },
];

impl Merchant {
    /// Every merchant, in catalog order
    pub const ALL: [Self; 5] = [
        Self::FakeStore,
        Self::SauceDemo,
        Self::OpenCartDemo,
        Self::EcomDemo1,
        Self::EcomDemo2,
    ];

    /// Short name used on the command line and in reports
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::FakeStore => "fake-store",
            Self::SauceDemo => "sauce-demo",
            Self::OpenCartDemo => "opencart-demo",
            Self::EcomDemo1 => "ecom-demo-1",
            Self::EcomDemo2 => "ecom-demo-2",
        }
    }

    /// All pages of this merchant
    pub fn urls(self) -> impl Iterator<Item = &'static str> {
        MERCHANT_URLS
            .iter()
            .filter(move |entry| entry.merchant == self)
            .map(|entry| entry.url)
    }

    /// Page visited when verifying this merchant
    #[must_use]
    pub fn first_url(self) -> &'static str {
        // Every merchant has at least one entry in MERCHANT_URLS.
        self.urls().next().unwrap_or_default()
    }
}

impl fmt::Display for Merchant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_merchant_has_pages() {
        for merchant in Merchant::ALL {
            assert!(merchant.urls().count() >= 1, "{merchant} has no pages");
            assert!(merchant.first_url().starts_with("https://"));
        }
    }

    #[test]
    fn test_first_url_is_catalog_order() {
        assert_eq!(
            Merchant::FakeStore.first_url(),
            "https://fakestoreapi.com/products/1"
        );
        assert_eq!(
            Merchant::OpenCartDemo.first_url(),
            "https://demo.opencart.com/index.php?route=product/product&product_id=43"
        );
        assert_eq!(Merchant::EcomDemo2.urls().count(), 2);
    }

    #[test]
    fn test_short_names_match_value_names() {
        for merchant in Merchant::ALL {
            let parsed = Merchant::from_str(merchant.short_name(), false).unwrap();
            assert_eq!(parsed, merchant);
            assert_eq!(merchant.to_string(), merchant.short_name());
        }
    }

    #[test]
    fn test_serde_uses_short_names() {
        let json = serde_json::to_string(&Merchant::EcomDemo1).unwrap();
        assert_eq!(json, "\"ecom-demo-1\"");
    }
}
