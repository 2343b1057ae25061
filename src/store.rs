use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::format::format_phone_number;
use crate::models::{Client, ClientInput, Invoice, InvoiceInput, InvoiceStatus, ItemInput};
use crate::numbering::{next_invoice_number, sequence_in_year};
use crate::totals::item_from_input;
use crate::validation::{validate_client, validate_invoice};

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait ClientRepository: Send + Sync {
    fn get_client(&self, id: &str) -> Result<Option<Client>>;
    fn list_clients(&self) -> Result<Vec<Client>>;
    fn create_client(&self, input: &ClientInput) -> Result<Client>;
    fn update_client(&self, id: &str, input: &ClientInput) -> Result<Client>;
    /// Refuses while any invoice still references the client.
    fn delete_client(&self, id: &str) -> Result<()>;
}

pub trait InvoiceRepository: Send + Sync {
    fn get_invoice(&self, id: &str) -> Result<Option<Invoice>>;
    fn list_invoices(&self) -> Result<Vec<Invoice>>;
    fn create_invoice(&self, input: &InvoiceInput) -> Result<Invoice>;
    fn update_invoice(&self, id: &str, input: &InvoiceInput) -> Result<Invoice>;
    fn delete_invoice(&self, id: &str) -> Result<()>;
    /// Applies `edit` to a stored invoice, then recomputes its totals.
    fn modify_invoice(
        &self,
        id: &str,
        edit: &mut dyn FnMut(&mut Invoice) -> Result<()>,
    ) -> Result<Invoice>;
    /// Number the next invoice issued in `year` would receive.
    fn next_invoice_number(&self, year: i32) -> Result<String>;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store: ClientRepository + InvoiceRepository {}

impl<T: ClientRepository + InvoiceRepository> Store for T {}

/// Values applied when an invoice form leaves a field empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceDefaults {
    pub tax_rate: f64,
    pub payment_terms_days: u64,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self {
            tax_rate: 0.1,
            payment_terms_days: 30,
        }
    }
}

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    invoices: Vec<Invoice>,
}

impl Tables {
    fn client(&self, id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    fn invoice_index(&self, id: &str) -> Option<usize> {
        self.invoices.iter().position(|i| i.id == id)
    }

    fn next_number(&self, year: i32) -> Result<String> {
        let last = self
            .invoices
            .iter()
            .filter_map(|i| sequence_in_year(&i.id, year).map(|seq| (seq, i.id.as_str())))
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, id)| id);
        next_invoice_number(last, year).ok_or(StoreError::NumberingExhausted(year))
    }
}

/// Process-local store; contents are gone when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    defaults: InvoiceDefaults,
}

impl InMemoryStore {
    pub fn new(defaults: InvoiceDefaults) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            defaults,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn is_empty(&self) -> Result<bool> {
        let tables = self.lock()?;
        Ok(tables.clients.is_empty() && tables.invoices.is_empty())
    }

    /// Fills in dates and tax rate the form left blank.
    fn resolve(&self, input: &InvoiceInput, today: NaiveDate) -> InvoiceInput {
        let mut resolved = input.clone();
        let issue = resolved.issue_date.unwrap_or(today);
        resolved.issue_date = Some(issue);
        resolved.due_date = Some(resolved.due_date.unwrap_or_else(|| {
            issue
                .checked_add_days(Days::new(self.defaults.payment_terms_days))
                .unwrap_or(issue)
        }));
        resolved.tax_rate = Some(resolved.tax_rate.unwrap_or(self.defaults.tax_rate));
        resolved
    }

    /// Loads the sample clients and invoices shown on a fresh dashboard.
    pub fn seed_data(&self) -> Result<(usize, usize)> {
        struct SeedClient {
            id: &'static str,
            name: &'static str,
            email: &'static str,
            phone: &'static str,
            address: &'static str,
            city: &'static str,
            state: &'static str,
            zip_code: &'static str,
            created: (i32, u32, u32),
        }

        struct SeedInvoice {
            id: &'static str,
            client_id: &'static str,
            issued: (i32, u32, u32),
            due: (i32, u32, u32),
            status: InvoiceStatus,
            items: Vec<(&'static str, f64, f64)>,
        }

        let clients = vec![
            SeedClient {
                id: "client-001",
                name: "Acme Corporation",
                email: "billing@acmecorp.com",
                phone: "(555) 123-4567",
                address: "123 Main Street",
                city: "San Francisco",
                state: "CA",
                zip_code: "94105",
                created: (2023, 1, 15),
            },
            SeedClient {
                id: "client-002",
                name: "Globex Industries",
                email: "accounts@globex.com",
                phone: "(555) 987-6543",
                address: "456 Market Street",
                city: "New York",
                state: "NY",
                zip_code: "10001",
                created: (2023, 2, 22),
            },
            SeedClient {
                id: "client-003",
                name: "Stark Enterprises",
                email: "finance@stark.com",
                phone: "(555) 345-6789",
                address: "789 Tech Blvd",
                city: "Boston",
                state: "MA",
                zip_code: "02108",
                created: (2023, 3, 10),
            },
            SeedClient {
                id: "client-004",
                name: "Wayne Industries",
                email: "payments@wayne.com",
                phone: "(555) 456-7890",
                address: "1007 Mountain Drive",
                city: "Chicago",
                state: "IL",
                zip_code: "60601",
                created: (2023, 4, 5),
            },
            SeedClient {
                id: "client-005",
                name: "Oscorp Technologies",
                email: "invoices@oscorp.com",
                phone: "(555) 567-8901",
                address: "888 Science Park",
                city: "Seattle",
                state: "WA",
                zip_code: "98101",
                created: (2023, 5, 18),
            },
        ];

        let invoices = vec![
            SeedInvoice {
                id: "INV-2023-001",
                client_id: "client-001",
                issued: (2023, 6, 1),
                due: (2023, 7, 1),
                status: InvoiceStatus::Paid,
                items: vec![
                    ("Web Development Services", 1.0, 2000.0),
                    ("Hosting (Annual)", 1.0, 300.0),
                ],
            },
            SeedInvoice {
                id: "INV-2023-002",
                client_id: "client-002",
                issued: (2023, 6, 15),
                due: (2023, 7, 15),
                status: InvoiceStatus::Paid,
                items: vec![("UI/UX Design", 1.0, 1500.0), ("Logo Design", 1.0, 500.0)],
            },
            SeedInvoice {
                id: "INV-2023-003",
                client_id: "client-003",
                issued: (2023, 7, 1),
                due: (2023, 8, 1),
                status: InvoiceStatus::Sent,
                items: vec![("Mobile App Development", 1.0, 5000.0), ("QA Testing", 40.0, 50.0)],
            },
            SeedInvoice {
                id: "INV-2023-004",
                client_id: "client-004",
                issued: (2023, 7, 15),
                due: (2023, 8, 15),
                status: InvoiceStatus::Overdue,
                items: vec![("SEO Consulting", 10.0, 150.0), ("Content Creation", 5.0, 200.0)],
            },
            SeedInvoice {
                id: "INV-2023-005",
                client_id: "client-005",
                issued: (2023, 8, 1),
                due: (2023, 9, 1),
                status: InvoiceStatus::Draft,
                items: vec![("Server Maintenance", 1.0, 800.0), ("Security Audit", 1.0, 1200.0)],
            },
            SeedInvoice {
                id: "INV-2023-006",
                client_id: "client-001",
                issued: (2023, 8, 15),
                due: (2023, 9, 15),
                status: InvoiceStatus::Sent,
                items: vec![
                    ("Database Optimization", 1.0, 1000.0),
                    ("Performance Tuning", 1.0, 800.0),
                ],
            },
            SeedInvoice {
                id: "INV-2023-007",
                client_id: "client-003",
                issued: (2023, 9, 1),
                due: (2023, 10, 1),
                status: InvoiceStatus::Draft,
                items: vec![("API Integration", 1.0, 1500.0), ("Custom Development", 20.0, 100.0)],
            },
        ];

        fn date((y, m, d): (i32, u32, u32)) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
        }

        fn midnight(day: NaiveDate) -> DateTime<Utc> {
            day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
        }

        let mut tables = self.lock()?;

        for seed in &clients {
            tables.clients.push(Client {
                id: seed.id.to_string(),
                name: seed.name.to_string(),
                email: seed.email.to_string(),
                phone: Some(seed.phone.to_string()),
                address: seed.address.to_string(),
                city: seed.city.to_string(),
                state: seed.state.to_string(),
                zip_code: seed.zip_code.to_string(),
                country: "USA".to_string(),
                created_at: midnight(date(seed.created)),
            });
        }

        for seed in &invoices {
            let client = tables
                .client(seed.client_id)
                .cloned()
                .ok_or_else(|| StoreError::UnknownClient(seed.client_id.to_string()))?;
            let issue_date = date(seed.issued);
            let items = seed
                .items
                .iter()
                .map(|(description, quantity, unit_price)| {
                    item_from_input(&ItemInput {
                        id: None,
                        description: description.to_string(),
                        quantity: *quantity,
                        unit_price: *unit_price,
                    })
                })
                .collect();
            let mut invoice = Invoice {
                id: seed.id.to_string(),
                client_id: client.id.clone(),
                client,
                issue_date,
                due_date: date(seed.due),
                items,
                subtotal: 0.0,
                tax_rate: 0.1,
                tax_amount: 0.0,
                total: 0.0,
                notes: Some("Thank you for your business!".to_string()),
                status: seed.status,
                // drafted the day before issue
                created_at: midnight(issue_date.pred_opt().unwrap_or(issue_date)),
            };
            invoice.recompute();
            tables.invoices.push(invoice);
        }

        Ok((clients.len(), invoices.len()))
    }
}

fn client_from_input(id: String, input: &ClientInput, created_at: DateTime<Utc>) -> Client {
    let input = input.trimmed();
    Client {
        id,
        name: input.name,
        email: input.email,
        phone: input.phone.as_deref().map(format_phone_number),
        address: input.address,
        city: input.city,
        state: input.state,
        zip_code: input.zip_code,
        country: input.country,
        created_at,
    }
}

impl ClientRepository for InMemoryStore {
    fn get_client(&self, id: &str) -> Result<Option<Client>> {
        Ok(self.lock()?.client(id).cloned())
    }

    fn list_clients(&self) -> Result<Vec<Client>> {
        Ok(self.lock()?.clients.clone())
    }

    fn create_client(&self, input: &ClientInput) -> Result<Client> {
        validate_client(input)?;
        let client = client_from_input(Uuid::new_v4().to_string(), input, Utc::now());
        self.lock()?.clients.push(client.clone());
        info!(client = %client.id, "created client");
        Ok(client)
    }

    fn update_client(&self, id: &str, input: &ClientInput) -> Result<Client> {
        validate_client(input)?;
        let mut tables = self.lock()?;
        let slot = tables
            .clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::client_not_found(id))?;
        *slot = client_from_input(slot.id.clone(), input, slot.created_at);
        let client = slot.clone();

        let mut refreshed = 0;
        for invoice in tables.invoices.iter_mut().filter(|i| i.client_id == id) {
            invoice.client = client.clone();
            refreshed += 1;
        }
        debug!(client = %id, refreshed, "refreshed invoice client snapshots");
        Ok(client)
    }

    fn delete_client(&self, id: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let index = tables
            .clients
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::client_not_found(id))?;
        let referencing = tables.invoices.iter().filter(|i| i.client_id == id).count();
        if referencing > 0 {
            return Err(StoreError::ClientInUse {
                id: id.to_string(),
                invoices: referencing,
            });
        }
        tables.clients.remove(index);
        info!(client = %id, "deleted client");
        Ok(())
    }
}

impl InvoiceRepository for InMemoryStore {
    fn get_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        let tables = self.lock()?;
        Ok(tables.invoice_index(id).map(|i| tables.invoices[i].clone()))
    }

    fn list_invoices(&self) -> Result<Vec<Invoice>> {
        Ok(self.lock()?.invoices.clone())
    }

    fn create_invoice(&self, input: &InvoiceInput) -> Result<Invoice> {
        let input = self.resolve(input, Utc::now().date_naive());
        validate_invoice(&input)?;

        let mut tables = self.lock()?;
        let client = tables
            .client(&input.client_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownClient(input.client_id.clone()))?;
        let issue_date = input.issue_date.unwrap_or_default();

        let id = match input.id.as_deref().map(str::trim) {
            Some(id) => {
                if tables.invoice_index(id).is_some() {
                    return Err(StoreError::DuplicateInvoice(id.to_string()));
                }
                id.to_string()
            }
            None => tables.next_number(issue_date.year())?,
        };

        let mut invoice = Invoice {
            id,
            client_id: client.id.clone(),
            client,
            issue_date,
            due_date: input.due_date.unwrap_or(issue_date),
            items: input.items.iter().map(item_from_input).collect(),
            subtotal: 0.0,
            tax_rate: input.tax_rate.unwrap_or(self.defaults.tax_rate),
            tax_amount: 0.0,
            total: 0.0,
            notes: input.notes.clone().filter(|n| !n.trim().is_empty()),
            status: input.status.unwrap_or_default(),
            created_at: Utc::now(),
        };
        invoice.recompute();
        tables.invoices.push(invoice.clone());
        info!(invoice = %invoice.id, total = invoice.total, "created invoice");
        Ok(invoice)
    }

    fn update_invoice(&self, id: &str, input: &InvoiceInput) -> Result<Invoice> {
        let mut tables = self.lock()?;
        let index = tables
            .invoice_index(id)
            .ok_or_else(|| StoreError::invoice_not_found(id))?;
        let current = &tables.invoices[index];

        let mut input = input.clone();
        input.id = None;
        input.issue_date = input.issue_date.or(Some(current.issue_date));
        input.due_date = input.due_date.or(Some(current.due_date));
        input.tax_rate = input.tax_rate.or(Some(current.tax_rate));
        validate_invoice(&input)?;

        let client = tables
            .client(&input.client_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownClient(input.client_id.clone()))?;

        let invoice = &mut tables.invoices[index];
        invoice.client_id = client.id.clone();
        invoice.client = client;
        invoice.issue_date = input.issue_date.unwrap_or(invoice.issue_date);
        invoice.due_date = input.due_date.unwrap_or(invoice.due_date);
        invoice.items = input.items.iter().map(item_from_input).collect();
        invoice.tax_rate = input.tax_rate.unwrap_or(invoice.tax_rate);
        invoice.notes = input.notes.clone().filter(|n| !n.trim().is_empty());
        if let Some(status) = input.status {
            invoice.status = status;
        }
        invoice.recompute();
        info!(invoice = %id, total = invoice.total, "updated invoice");
        Ok(invoice.clone())
    }

    fn delete_invoice(&self, id: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let index = tables
            .invoice_index(id)
            .ok_or_else(|| StoreError::invoice_not_found(id))?;
        tables.invoices.remove(index);
        info!(invoice = %id, "deleted invoice");
        Ok(())
    }

    fn modify_invoice(
        &self,
        id: &str,
        edit: &mut dyn FnMut(&mut Invoice) -> Result<()>,
    ) -> Result<Invoice> {
        let mut tables = self.lock()?;
        let index = tables
            .invoice_index(id)
            .ok_or_else(|| StoreError::invoice_not_found(id))?;

        // edit a copy so a failed edit leaves the stored invoice untouched
        let mut invoice = tables.invoices[index].clone();
        edit(&mut invoice)?;
        invoice.id = id.to_string();
        invoice.recompute();
        tables.invoices[index] = invoice.clone();
        Ok(invoice)
    }

    fn next_invoice_number(&self, year: i32) -> Result<String> {
        self.lock()?.next_number(year)
    }
}
