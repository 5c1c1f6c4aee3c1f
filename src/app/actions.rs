use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{CatalogApi, CatalogError, Product, ProductPatch, ProductPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Load,
    Create,
    Update,
}

/// Completion of one remote round trip.
#[derive(Debug)]
pub enum RemoteEvent {
    Loaded(Result<Vec<Product>, CatalogError>),
    Created(Result<Product, CatalogError>),
    Updated {
        id: i64,
        result: Result<ProductPatch, CatalogError>,
    },
}

impl RemoteEvent {
    pub fn kind(&self) -> OperationKind {
        match self {
            RemoteEvent::Loaded(_) => OperationKind::Load,
            RemoteEvent::Created(_) => OperationKind::Create,
            RemoteEvent::Updated { .. } => OperationKind::Update,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0} already in progress")]
    Busy(OperationKind),
    #[error("could not start {kind} request: {source}")]
    Spawn {
        kind: OperationKind,
        #[source]
        source: std::io::Error,
    },
}

/// Runs each remote operation on its own worker thread and hands results
/// back over a channel. At most one request per operation kind is in flight.
pub struct ActionDispatcher {
    api: Arc<dyn CatalogApi>,
    sender: Sender<RemoteEvent>,
    receiver: Receiver<RemoteEvent>,
    in_flight: BTreeSet<OperationKind>,
}

impl ActionDispatcher {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            api,
            sender,
            receiver,
            in_flight: BTreeSet::new(),
        }
    }

    pub fn load(&mut self) -> Result<(), DispatchError> {
        self.spawn(OperationKind::Load, |api| RemoteEvent::Loaded(api.list()))
    }

    pub fn create(&mut self, payload: ProductPayload) -> Result<(), DispatchError> {
        self.spawn(OperationKind::Create, move |api| {
            RemoteEvent::Created(api.create(&payload))
        })
    }

    pub fn update(&mut self, id: i64, payload: ProductPayload) -> Result<(), DispatchError> {
        self.spawn(OperationKind::Update, move |api| RemoteEvent::Updated {
            id,
            result: api.update(id, &payload),
        })
    }

    pub fn is_in_flight(&self, kind: OperationKind) -> bool {
        self.in_flight.contains(&kind)
    }

    pub fn in_flight(&self) -> Vec<OperationKind> {
        self.in_flight.iter().copied().collect()
    }

    /// Drains finished operations without blocking.
    pub fn poll(&mut self) -> Vec<RemoteEvent> {
        let events: Vec<RemoteEvent> = self.receiver.try_iter().collect();
        for event in &events {
            self.in_flight.remove(&event.kind());
        }
        events
    }

    /// Blocks until one operation finishes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<RemoteEvent> {
        let event = self.receiver.recv_timeout(timeout).ok()?;
        self.in_flight.remove(&event.kind());
        Some(event)
    }

    fn spawn<F>(&mut self, kind: OperationKind, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&dyn CatalogApi) -> RemoteEvent + Send + 'static,
    {
        if self.in_flight.contains(&kind) {
            tracing::warn!(%kind, "rejecting overlapping request");
            return Err(DispatchError::Busy(kind));
        }
        let api = Arc::clone(&self.api);
        let sender = self.sender.clone();
        let request_id = Uuid::new_v4();
        thread::Builder::new()
            .name(format!("catalog-{kind}"))
            .spawn(move || {
                let span = tracing::info_span!("remote", %request_id, op = %kind);
                let _guard = span.enter();
                let event = job(api.as_ref());
                match &event {
                    RemoteEvent::Loaded(Err(err))
                    | RemoteEvent::Created(Err(err))
                    | RemoteEvent::Updated { result: Err(err), .. } => {
                        tracing::error!(?err, "remote operation failed");
                    }
                    _ => tracing::info!("remote operation finished"),
                }
                // The receiver only disappears when the controller shuts down.
                let _ = sender.send(event);
            })
            .map_err(|source| DispatchError::Spawn { kind, source })?;
        self.in_flight.insert(kind);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use crossbeam_channel::{Receiver, Sender};

    use crate::catalog::{
        CatalogApi, CatalogError, Category, Product, ProductPatch, ProductPayload,
    };

    pub fn product(id: i64, title: &str, price: f64) -> Product {
        Product {
            id,
            title: title.to_string(),
            price,
            description: format!("{title} description"),
            category: Some(Category {
                id: 1,
                name: "Misc".into(),
            }),
            images: vec![format!("https://img/{id}.png")],
        }
    }

    /// In-memory catalog. When gated, every call waits for a release signal.
    pub struct FakeCatalog {
        pub products: Mutex<Vec<Product>>,
        pub fail_with: Mutex<Option<(u16, String)>>,
        pub updates: Mutex<Vec<(i64, ProductPayload)>>,
        gate: Option<(Sender<()>, Receiver<()>)>,
    }

    impl FakeCatalog {
        pub fn with_products(products: Vec<Product>) -> Self {
            Self {
                products: Mutex::new(products),
                fail_with: Mutex::new(None),
                updates: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        pub fn gated(products: Vec<Product>) -> Self {
            let mut fake = Self::with_products(products);
            fake.gate = Some(crossbeam_channel::unbounded());
            fake
        }

        pub fn fail(&self, status: u16, message: &str) {
            *self.fail_with.lock().expect("lock") = Some((status, message.to_string()));
        }

        pub fn release(&self) {
            if let Some((tx, _)) = &self.gate {
                tx.send(()).expect("release");
            }
        }

        fn check(&self) -> Result<(), CatalogError> {
            if let Some((_, rx)) = &self.gate {
                rx.recv().expect("gate");
            }
            match self.fail_with.lock().expect("lock").clone() {
                Some((status, message)) => Err(CatalogError::Status { status, message }),
                None => Ok(()),
            }
        }
    }

    impl CatalogApi for FakeCatalog {
        fn list(&self) -> Result<Vec<Product>, CatalogError> {
            self.check()?;
            Ok(self.products.lock().expect("lock").clone())
        }

        fn get(&self, id: i64) -> Result<Product, CatalogError> {
            self.check()?;
            self.products
                .lock()
                .expect("lock")
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| CatalogError::Status {
                    status: 404,
                    message: "Not Found".into(),
                })
        }

        fn create(&self, payload: &ProductPayload) -> Result<Product, CatalogError> {
            self.check()?;
            let mut products = self.products.lock().expect("lock");
            let id = products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            let created = Product {
                id,
                title: payload.title.clone(),
                price: payload.price,
                description: payload.description.clone(),
                category: Some(Category {
                    id: payload.category_id,
                    name: "Created".into(),
                }),
                images: payload.images.clone(),
            };
            products.push(created.clone());
            Ok(created)
        }

        fn update(&self, id: i64, payload: &ProductPayload) -> Result<ProductPatch, CatalogError> {
            self.check()?;
            self.updates
                .lock()
                .expect("lock")
                .push((id, payload.clone()));
            Ok(ProductPatch {
                title: Some(payload.title.clone()),
                price: Some(payload.price),
                description: Some(payload.description.clone()),
                category: None,
                images: Some(payload.images.clone()),
            })
        }
    }
}
