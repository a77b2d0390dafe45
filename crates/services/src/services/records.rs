//! `BackupRecord` implementations for the ten store entities.

use async_trait::async_trait;
use db::models::{
    STEM_LENGTHS,
    category::Category,
    config::Config,
    consignment::{Consignment, ConsignmentItem, ConsignmentWithItems},
    customer::Customer,
    delivery::Delivery,
    invoice::Invoice,
    order::{Order, OrderItem, OrderWithItems},
    product::Product,
    subscription::{Subscription, SubscriptionItem, SubscriptionWithItems},
    user::User,
};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{
    csv_record::{BackupRecord, CsvRow, FieldError, ToCell, json_cell},
    entity::EntityKind,
};

/// Header columns expected in an export of `kind`.
pub fn columns_for(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Config => Config::COLUMNS,
        EntityKind::Categories => Category::COLUMNS,
        EntityKind::Products => Product::COLUMNS,
        EntityKind::Customers => Customer::COLUMNS,
        EntityKind::Users => User::COLUMNS,
        EntityKind::Orders => OrderWithItems::COLUMNS,
        EntityKind::Invoices => Invoice::COLUMNS,
        EntityKind::Subscriptions => SubscriptionWithItems::COLUMNS,
        EntityKind::Consignments => ConsignmentWithItems::COLUMNS,
        EntityKind::Deliveries => Delivery::COLUMNS,
    }
}

fn check_stem_length(stem_length: i32) -> Result<(), FieldError> {
    if STEM_LENGTHS.contains(&stem_length) {
        Ok(())
    } else {
        Err(FieldError::Constraint(format!(
            "stem length {stem_length} is not one of {STEM_LENGTHS:?}"
        )))
    }
}

fn check_parent(kind: &str, item_id: Uuid, parent_id: Uuid, expected: Uuid) -> Result<(), FieldError> {
    if parent_id == expected {
        Ok(())
    } else {
        Err(FieldError::Constraint(format!(
            "{kind} item {item_id} belongs to {parent_id}, not {expected}"
        )))
    }
}

#[async_trait]
impl BackupRecord for User {
    const KIND: EntityKind = EntityKind::Users;
    const COLUMNS: &'static [&'static str] =
        &["id", "email", "name", "role", "active", "created_at", "updated_at"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_cell(),
            self.email.to_cell(),
            self.name.to_cell(),
            self.role.to_string(),
            self.active.to_cell(),
            self.created_at.to_cell(),
            self.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        Ok(User {
            id: row.required("id")?,
            email: row.required("email")?,
            name: row.required("name")?,
            role: row.variant("role")?,
            active: row.required("active")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        User::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for Category {
    const KIND: EntityKind = EntityKind::Categories;
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "description", "created_at", "updated_at"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_cell(),
            self.name.to_cell(),
            self.description.to_cell(),
            self.created_at.to_cell(),
            self.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        Ok(Category {
            id: row.required("id")?,
            name: row.required("name")?,
            description: row.optional("description")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Category::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for Product {
    const KIND: EntityKind = EntityKind::Products;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "sku",
        "name",
        "description",
        "category_id",
        "price_50cm",
        "price_60cm",
        "price_70cm",
        "stock",
        "min_stock",
        "active",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_cell(),
            self.sku.to_cell(),
            self.name.to_cell(),
            self.description.to_cell(),
            self.category_id.to_cell(),
            self.price_50cm.to_cell(),
            self.price_60cm.to_cell(),
            self.price_70cm.to_cell(),
            self.stock.to_cell(),
            self.min_stock.to_cell(),
            self.active.to_cell(),
            self.created_at.to_cell(),
            self.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        Ok(Product {
            id: row.required("id")?,
            sku: row.required("sku")?,
            name: row.required("name")?,
            description: row.optional("description")?,
            category_id: row.optional("category_id")?,
            price_50cm: row.required("price_50cm")?,
            price_60cm: row.required("price_60cm")?,
            price_70cm: row.required("price_70cm")?,
            stock: row.required("stock")?,
            min_stock: row.required("min_stock")?,
            active: row.required("active")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Product::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for Customer {
    const KIND: EntityKind = EntityKind::Customers;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "phone",
        "address",
        "city",
        "customer_type",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_cell(),
            self.name.to_cell(),
            self.email.to_cell(),
            self.phone.to_cell(),
            self.address.to_cell(),
            self.city.to_cell(),
            self.customer_type.to_string(),
            self.created_at.to_cell(),
            self.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        Ok(Customer {
            id: row.required("id")?,
            name: row.required("name")?,
            email: row.optional("email")?,
            phone: row.optional("phone")?,
            address: row.optional("address")?,
            city: row.optional("city")?,
            customer_type: row.variant("customer_type")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Customer::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for OrderWithItems {
    const KIND: EntityKind = EntityKind::Orders;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "order_number",
        "customer_id",
        "status",
        "total",
        "notes",
        "items",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.order.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.order.id.to_cell(),
            self.order.order_number.to_cell(),
            self.order.customer_id.to_cell(),
            self.order.status.to_string(),
            self.order.total.to_cell(),
            self.order.notes.to_cell(),
            json_cell(&self.items),
            self.order.created_at.to_cell(),
            self.order.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        let order = Order {
            id: row.required("id")?,
            order_number: row.required("order_number")?,
            customer_id: row.required("customer_id")?,
            status: row.variant("status")?,
            total: row.required("total")?,
            notes: row.optional("notes")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        };
        let items: Vec<OrderItem> = row.json("items")?;
        for item in &items {
            check_parent("order", item.id, item.order_id, order.id)?;
            check_stem_length(item.stem_length)?;
        }
        Ok(OrderWithItems { order, items })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        OrderWithItems::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for Invoice {
    const KIND: EntityKind = EntityKind::Invoices;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "invoice_number",
        "customer_id",
        "order_id",
        "amount",
        "status",
        "due_date",
        "paid_at",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_cell(),
            self.invoice_number.to_cell(),
            self.customer_id.to_cell(),
            self.order_id.to_cell(),
            self.amount.to_cell(),
            self.status.to_string(),
            self.due_date.to_cell(),
            self.paid_at.to_cell(),
            self.created_at.to_cell(),
            self.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        Ok(Invoice {
            id: row.required("id")?,
            invoice_number: row.required("invoice_number")?,
            customer_id: row.required("customer_id")?,
            order_id: row.optional("order_id")?,
            amount: row.required("amount")?,
            status: row.variant("status")?,
            due_date: row.required("due_date")?,
            paid_at: row.optional("paid_at")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Invoice::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for SubscriptionWithItems {
    const KIND: EntityKind = EntityKind::Subscriptions;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "customer_id",
        "frequency",
        "status",
        "next_delivery",
        "items",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.subscription.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.subscription.id.to_cell(),
            self.subscription.customer_id.to_cell(),
            self.subscription.frequency.to_string(),
            self.subscription.status.to_string(),
            self.subscription.next_delivery.to_cell(),
            json_cell(&self.items),
            self.subscription.created_at.to_cell(),
            self.subscription.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        let subscription = Subscription {
            id: row.required("id")?,
            customer_id: row.required("customer_id")?,
            frequency: row.variant("frequency")?,
            status: row.variant("status")?,
            next_delivery: row.required("next_delivery")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        };
        let items: Vec<SubscriptionItem> = row.json("items")?;
        for item in &items {
            check_parent("subscription", item.id, item.subscription_id, subscription.id)?;
            check_stem_length(item.stem_length)?;
        }
        Ok(SubscriptionWithItems {
            subscription,
            items,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        SubscriptionWithItems::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for ConsignmentWithItems {
    const KIND: EntityKind = EntityKind::Consignments;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "customer_id",
        "status",
        "delivered_at",
        "settled_at",
        "items",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.consignment.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.consignment.id.to_cell(),
            self.consignment.customer_id.to_cell(),
            self.consignment.status.to_string(),
            self.consignment.delivered_at.to_cell(),
            self.consignment.settled_at.to_cell(),
            json_cell(&self.items),
            self.consignment.created_at.to_cell(),
            self.consignment.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        let consignment = Consignment {
            id: row.required("id")?,
            customer_id: row.required("customer_id")?,
            status: row.variant("status")?,
            delivered_at: row.required("delivered_at")?,
            settled_at: row.optional("settled_at")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        };
        let items: Vec<ConsignmentItem> = row.json("items")?;
        for item in &items {
            check_parent("consignment", item.id, item.consignment_id, consignment.id)?;
            item.validate().map_err(|e| {
                FieldError::Constraint(format!("consignment item {}: {e}", item.id))
            })?;
        }
        Ok(ConsignmentWithItems { consignment, items })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        ConsignmentWithItems::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for Delivery {
    const KIND: EntityKind = EntityKind::Deliveries;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "order_id",
        "driver_id",
        "status",
        "scheduled_for",
        "delivered_at",
        "address",
        "route_position",
        "notes",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_cell(),
            self.order_id.to_cell(),
            self.driver_id.to_cell(),
            self.status.to_string(),
            self.scheduled_for.to_cell(),
            self.delivered_at.to_cell(),
            self.address.to_cell(),
            self.route_position.to_cell(),
            self.notes.to_cell(),
            self.created_at.to_cell(),
            self.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        Ok(Delivery {
            id: row.required("id")?,
            order_id: row.required("order_id")?,
            driver_id: row.optional("driver_id")?,
            status: row.variant("status")?,
            scheduled_for: row.required("scheduled_for")?,
            delivered_at: row.optional("delivered_at")?,
            address: row.required("address")?,
            route_position: row.optional("route_position")?,
            notes: row.optional("notes")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Delivery::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.update(conn).await.map(|_| ())
    }
}

#[async_trait]
impl BackupRecord for Config {
    const KIND: EntityKind = EntityKind::Config;
    const COLUMNS: &'static [&'static str] = &["id", "key", "value", "created_at", "updated_at"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.to_cell(),
            self.key.to_cell(),
            self.value.to_cell(),
            self.created_at.to_cell(),
            self.updated_at.to_cell(),
        ]
    }

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError> {
        Ok(Config {
            id: row.required("id")?,
            key: row.required("key")?,
            value: row.required("value")?,
            created_at: row.required("created_at")?,
            updated_at: row.required("updated_at")?,
        })
    }

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Config::find_all(pool).await
    }

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.insert(conn).await
    }

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        if self.update(&mut *conn).await? == 0 {
            self.replace_by_key(conn).await?;
        }
        Ok(())
    }

    // Settings are identified by key; a store seeded separately holds the
    // same keys under different ids.
    async fn exists(&self, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM configs WHERE id = $1 OR key = $2")
            .bind(self.id)
            .bind(&self.key)
            .fetch_one(conn)
            .await?;
        Ok(count > 0)
    }
}
