use crate::domain::order::{Order, OrderId};
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{OrderStore, PaymentStore};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing orders with their garments and history.
pub const CF_ORDERS: &str = "orders";

/// A persistent store implementation using RocksDB.
///
/// Payments and orders live in separate Column Families, keyed by their
/// big-endian id. Values are JSON.
///
/// RocksDB has no native compare-and-swap, so payment writes are serialized
/// through `write_lock` for the read-check-write sequence. `Clone` shares
/// both the `Arc<DB>` and the lock.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("payments" and "orders") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments, cf_orders])?;
        tracing::debug!("opened RocksDB store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: u32) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: u32, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value).map_err(|e| {
            LedgerError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;
        self.db.put_cf(cf, key.to_be_bytes(), bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        LedgerError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read::<Payment>(CF_PAYMENTS, payment.id)?.is_some() {
            return Err(LedgerError::Duplicate(format!("payment {}", payment.id)));
        }
        self.write(CF_PAYMENTS, payment.id, &payment)
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, payment_id)
    }

    async fn compare_and_swap(&self, mut payment: Payment, expected_version: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let current: Payment = self
            .read(CF_PAYMENTS, payment.id)?
            .ok_or_else(|| LedgerError::NotFound(format!("payment {}", payment.id)))?;
        if current.version != expected_version {
            return Err(LedgerError::Conflict(format!(
                "payment {} is at version {}, expected {}",
                payment.id, current.version, expected_version
            )));
        }
        payment.version = expected_version + 1;
        self.write(CF_PAYMENTS, payment.id, &payment)
    }

    async fn all_payments(&self) -> Result<Vec<Payment>> {
        self.scan(CF_PAYMENTS)
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn store(&self, order: Order) -> Result<()> {
        self.write(CF_ORDERS, order.id, &order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, order_id)
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS)
    }
}
