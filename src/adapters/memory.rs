use crate::{
    CashAccount, Client, Error, LedgerEntry, MonthWindow, Order, OrderPlan, StockMovement,
    StoreAdapter, Strain,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Clone)]
struct MemoryStore {
    // Vecs keep insertion order, which range reads report as-is.
    entries: Arc<Mutex<Vec<LedgerEntry>>>,
    orders: Arc<Mutex<Vec<Order>>>,
    stock_movements: Arc<Mutex<Vec<StockMovement>>>,
    clients: Arc<Mutex<HashMap<Uuid, Client>>>,
    accounts: Arc<Mutex<Vec<CashAccount>>>,
    strains: Arc<Mutex<HashMap<Uuid, Strain>>>,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            orders: Arc::new(Mutex::new(Vec::new())),
            stock_movements: Arc::new(Mutex::new(Vec::new())),
            clients: Arc::new(Mutex::new(HashMap::new())),
            accounts: Arc::new(Mutex::new(Vec::new())),
            strains: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

// Multi-table writes take locks in this order: strains, clients, accounts,
// orders, entries, stock_movements.
fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, Error> {
    mutex
        .lock()
        .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
}

/// Process-local store. Cheap to clone; clones share the same data.
#[derive(Clone)]
pub struct MemoryAdapter {
    store: MemoryStore,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
        }
    }

    /// Stock movements recorded so far, oldest first.
    pub fn stock_movements(&self) -> Result<Vec<StockMovement>, Error> {
        Ok(lock(&self.store.stock_movements)?.clone())
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreAdapter for MemoryAdapter {
    async fn entries_in(&self, window: &MonthWindow) -> Result<Vec<LedgerEntry>, Error> {
        let entries = lock(&self.store.entries)?;
        Ok(entries
            .iter()
            .filter(|e| window.contains(&e.timestamp))
            .cloned()
            .collect())
    }

    async fn orders_in(&self, window: &MonthWindow) -> Result<Vec<Order>, Error> {
        let orders = lock(&self.store.orders)?;
        Ok(orders
            .iter()
            .filter(|o| window.contains(&o.timestamp))
            .cloned()
            .collect())
    }

    async fn recent_entries(&self, limit: u32) -> Result<Vec<LedgerEntry>, Error> {
        let mut entries = lock(&self.store.entries)?.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn recent_orders(&self, limit: u32) -> Result<Vec<Order>, Error> {
        let mut orders = lock(&self.store.orders)?.clone();
        orders.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        orders.truncate(limit as usize);
        Ok(orders)
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, Error> {
        Ok(lock(&self.store.clients)?.get(&id).cloned())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<CashAccount>, Error> {
        Ok(lock(&self.store.accounts)?
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<CashAccount>, Error> {
        let mut accounts = lock(&self.store.accounts)?.clone();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    async fn get_strain(&self, id: Uuid) -> Result<Option<Strain>, Error> {
        Ok(lock(&self.store.strains)?.get(&id).cloned())
    }

    async fn insert_entry(&self, entry: LedgerEntry) -> Result<(), Error> {
        lock(&self.store.entries)?.push(entry);
        Ok(())
    }

    async fn insert_order(&self, order: Order) -> Result<(), Error> {
        lock(&self.store.orders)?.push(order);
        Ok(())
    }

    async fn create_client(&self, client: Client) -> Result<(), Error> {
        lock(&self.store.clients)?.insert(client.id, client);
        Ok(())
    }

    async fn create_account(&self, account: CashAccount) -> Result<(), Error> {
        lock(&self.store.accounts)?.push(account);
        Ok(())
    }

    async fn create_strain(&self, strain: Strain) -> Result<(), Error> {
        lock(&self.store.strains)?.insert(strain.id, strain);
        Ok(())
    }

    async fn record_movement(
        &self,
        entry: LedgerEntry,
        delta: Decimal,
    ) -> Result<CashAccount, Error> {
        let mut accounts = lock(&self.store.accounts)?;
        let mut entries = lock(&self.store.entries)?;

        let account = accounts
            .iter_mut()
            .find(|a| a.id == entry.account_id)
            .ok_or_else(|| Error::NotFound(format!("account {}", entry.account_id)))?;
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or(Error::InvalidAmount)?;

        entries.push(entry);
        Ok(account.clone())
    }

    async fn record_order(&self, plan: OrderPlan) -> Result<(), Error> {
        let mut strains = lock(&self.store.strains)?;
        let mut clients = lock(&self.store.clients)?;
        let mut accounts = lock(&self.store.accounts)?;
        let mut orders = lock(&self.store.orders)?;
        let mut entries = lock(&self.store.entries)?;
        let mut stock_movements = lock(&self.store.stock_movements)?;

        // Check everything before touching anything.
        let strain_id = plan.movement.strain_id;
        let remaining = strains
            .get(&strain_id)
            .ok_or_else(|| Error::NotFound(format!("strain {}", strain_id)))?
            .stock_after(&plan.movement)?;

        let mut client = clients
            .get(&plan.client_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("client {}", plan.client_id)))?;
        plan.client_update.apply(&mut client)?;

        let credit = match &plan.income {
            Some(entry) => {
                let pos = accounts
                    .iter()
                    .position(|a| a.id == entry.account_id)
                    .ok_or_else(|| Error::NotFound(format!("account {}", entry.account_id)))?;
                let balance = accounts[pos]
                    .balance
                    .checked_add(entry.amount)
                    .ok_or(Error::InvalidAmount)?;
                Some((pos, balance))
            }
            None => None,
        };

        if let Some(strain) = strains.get_mut(&strain_id) {
            strain.grams_in_stock = remaining;
        }
        clients.insert(client.id, client);
        if let Some((pos, balance)) = credit {
            accounts[pos].balance = balance;
        }
        orders.push(plan.order);
        if let Some(entry) = plan.income {
            entries.push(entry);
        }
        stock_movements.push(plan.movement);

        Ok(())
    }

    async fn record_stock_movement(&self, movement: StockMovement) -> Result<Strain, Error> {
        let mut strains = lock(&self.store.strains)?;
        let mut stock_movements = lock(&self.store.stock_movements)?;

        let strain = strains
            .get_mut(&movement.strain_id)
            .ok_or_else(|| Error::NotFound(format!("strain {}", movement.strain_id)))?;
        strain.grams_in_stock = strain.stock_after(&movement)?;

        stock_movements.push(movement);
        Ok(strain.clone())
    }
}
