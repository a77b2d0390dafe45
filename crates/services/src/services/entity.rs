//! The ten record types covered by CSV export and import.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EntityKind {
    Config,
    Categories,
    Products,
    Customers,
    Users,
    Orders,
    Invoices,
    Subscriptions,
    Consignments,
    Deliveries,
}

impl EntityKind {
    /// Foreign-key safe order: every entity comes after the ones it references.
    pub const IMPORT_ORDER: [EntityKind; 10] = [
        EntityKind::Config,
        EntityKind::Categories,
        EntityKind::Products,
        EntityKind::Customers,
        EntityKind::Users,
        EntityKind::Orders,
        EntityKind::Invoices,
        EntityKind::Subscriptions,
        EntityKind::Consignments,
        EntityKind::Deliveries,
    ];

    /// Table holding the top-level rows.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Config => "configs",
            EntityKind::Categories => "categories",
            EntityKind::Products => "products",
            EntityKind::Customers => "customers",
            EntityKind::Users => "users",
            EntityKind::Orders => "orders",
            EntityKind::Invoices => "invoices",
            EntityKind::Subscriptions => "subscriptions",
            EntityKind::Consignments => "consignments",
            EntityKind::Deliveries => "deliveries",
        }
    }

    /// Child tables restored together with the parent row.
    pub fn child_tables(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Orders => &["order_items"],
            EntityKind::Subscriptions => &["subscription_items"],
            EntityKind::Consignments => &["consignment_items"],
            _ => &[],
        }
    }

    /// Every table the backup covers, in import order.
    pub fn all_tables() -> Vec<&'static str> {
        Self::IMPORT_ORDER
            .iter()
            .flat_map(|kind| std::iter::once(kind.table()).chain(kind.child_tables().iter().copied()))
            .collect()
    }

    /// `products_2025-03-01T10-30-00-000Z.csv`
    pub fn file_name(&self, stamp: &str) -> String {
        format!("{self}_{stamp}.csv")
    }

    /// Whether `file_name` is an export of this entity.
    pub fn matches_file(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(&format!("{self}_"))
            .is_some_and(|rest| rest.len() > ".csv".len() && rest.ends_with(".csv"))
    }

    /// Entity a CSV file belongs to, judged by its name.
    pub fn from_file_name(file_name: &str) -> Option<EntityKind> {
        Self::IMPORT_ORDER
            .into_iter()
            .find(|kind| kind.matches_file(file_name))
    }
}
