#![allow(dead_code)]

use accrual_engine::domain::accrual::{AccrualLookup, AccrualResponse};
use accrual_engine::domain::order::{Order, OrderStatus, Reward};
use accrual_engine::domain::ports::{AccrualClient, OrderStore};
use accrual_engine::error::{AccrualError, Result};
use accrual_engine::infrastructure::in_memory::InMemoryOrderStore;
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Canned accrual answers for stub clients.
#[derive(Debug, Clone)]
pub enum Scripted {
    Status(&'static str, Option<Decimal>),
    Unknown,
    Fail,
}

/// In-process accrual client with scripted answers and a concurrency high-watermark.
pub struct ScriptedClient {
    answers: Mutex<HashMap<String, Scripted>>,
    fallback: Scripted,
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(fallback: Scripted) -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            fallback,
            delay: Duration::ZERO,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn answer(self, number: &str, scripted: Scripted) -> Self {
        self.answers.lock().insert(number.to_string(), scripted);
        self
    }

    /// Replaces the answer for `number` on later lookups.
    pub fn set_answer(&self, number: &str, scripted: Scripted) {
        self.answers.lock().insert(number.to_string(), scripted);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccrualClient for ScriptedClient {
    async fn fetch(&self, number: &str) -> Result<AccrualLookup> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self
            .answers
            .lock()
            .get(number)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());

        self.current.fetch_sub(1, Ordering::SeqCst);
        match scripted {
            Scripted::Status(status, accrual) => Ok(AccrualLookup::Found(AccrualResponse {
                order: number.to_string(),
                status: status.to_string(),
                accrual,
            })),
            Scripted::Unknown => Ok(AccrualLookup::Unknown),
            Scripted::Fail => Err(AccrualError::UnexpectedStatus(500)),
        }
    }
}

/// In-memory store whose next `failures` status writes fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryOrderStore,
    failures: AtomicUsize,
    rejected: AtomicUsize,
}

impl FlakyStore {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn insert(&self, order: Order) -> Result<()> {
        self.inner.insert(order).await
    }

    async fn get(&self, number: &str) -> Result<Option<Order>> {
        self.inner.get(number).await
    }

    async fn orders_by_status(
        &self,
        statuses: &[OrderStatus],
        exclude: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        self.inner.orders_by_status(statuses, exclude, limit).await
    }

    async fn update_status_and_reward(
        &self,
        number: &str,
        status: OrderStatus,
        reward: Option<Reward>,
    ) -> Result<bool> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(AccrualError::InternalError(Box::new(std::io::Error::other(
                "write rejected",
            ))));
        }
        self.inner
            .update_status_and_reward(number, status, reward)
            .await
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        self.inner.all_orders().await
    }
}

/// Raw HTTP reply served by the fake accrual service.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

type Replies = Arc<HashMap<String, Reply>>;

async fn order_handler(State(replies): State<Replies>, Path(number): Path<String>) -> Response {
    match replies.get(&number) {
        Some(reply) => {
            let status = StatusCode::from_u16(reply.status).unwrap();
            if reply.body.is_empty() {
                status.into_response()
            } else {
                (
                    status,
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    reply.body.clone(),
                )
                    .into_response()
            }
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Starts a fake accrual service on an ephemeral port. Unlisted orders answer `204`.
pub async fn start_accrual_server(
    replies: HashMap<String, Reply>,
) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/api/orders/{number}", get(order_handler))
        .with_state(Arc::new(replies));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr: SocketAddr = listener.local_addr().expect("listener addr");
    let base_url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test server");
    });

    (base_url, handle)
}
