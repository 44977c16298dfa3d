use crate::engine::ClientRegistry;
use crate::event::Event;
use crate::request::{Request, RequestCommand};
use crate::router::{self, RouterContext};
use chrono::Utc;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A scheduled request plus its absolute deadline (epoch ms). Ordered by
/// deadline ascending, ties by admission sequence.
#[derive(Debug)]
struct PendingRequest {
    request: Request,
    deadline_ms: f64,
    seq: u64,
}

impl PartialEq for PendingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingRequest {}

impl PartialOrd for PendingRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline_ms
            .total_cmp(&other.deadline_ms)
            .then(self.seq.cmp(&other.seq))
    }
}

/// A request becomes due once the computation budget reserved at its
/// deadline would otherwise be eaten into.
fn due(now_ms: f64, deadline_ms: f64, budget_ms: f64) -> bool {
    now_ms > deadline_ms - budget_ms
}

/// Single coordinating loop over four sources: pending connections, the
/// request and event intake queues, and the deadline-ordered pending set.
///
/// All engine mutation happens from this task, except engine creation and
/// actuator registration which race in from router tasks through the
/// [`ClientRegistry`].
pub struct DispatchLoop {
    registry: Arc<ClientRegistry>,
    conn_rx: mpsc::UnboundedReceiver<TcpStream>,
    request_rx: mpsc::UnboundedReceiver<Request>,
    event_rx: mpsc::UnboundedReceiver<Event>,
    router_ctx: RouterContext,
    pending: BinaryHeap<Reverse<PendingRequest>>,
    next_seq: u64,
    budget_ms: f64,
}

impl DispatchLoop {
    pub fn new(
        registry: Arc<ClientRegistry>,
        conn_rx: mpsc::UnboundedReceiver<TcpStream>,
        request_rx: mpsc::UnboundedReceiver<Request>,
        event_rx: mpsc::UnboundedReceiver<Event>,
        router_ctx: RouterContext,
        budget_ms: f64,
    ) -> Self {
        Self {
            registry,
            conn_rx,
            request_rx,
            event_rx,
            router_ctx,
            pending: BinaryHeap::new(),
            next_seq: 0,
            budget_ms,
        }
    }

    fn now_ms() -> f64 {
        Utc::now().timestamp_millis() as f64
    }

    /// Admit a request into the pending set. A max-wait configuration
    /// command takes effect immediately, before its own scheduling.
    fn admit(&mut self, request: Request) {
        let engine = self.registry.get_or_create(request.client_id);
        if request.command == RequestCommand::ConfigUpdateMaxWaitTime {
            match request.data.parse::<f64>() {
                Ok(seconds) => engine.update_max_wait_time(seconds),
                Err(_) => {
                    warn!(client_id = request.client_id, data = %request.data, "Bad max-wait value")
                }
            }
        }
        let deadline_ms = request.timestamp + engine.max_wait_seconds() * 1000.0;
        debug!(client_id = request.client_id, deadline_ms, "Request queued");
        self.pending.push(Reverse(PendingRequest {
            request,
            deadline_ms,
            seq: self.next_seq,
        }));
        self.next_seq += 1;
    }

    /// Pop and deliver every request whose deadline check fires.
    fn fire_due_requests(&mut self) {
        while let Some(Reverse(head)) = self.pending.peek() {
            if !due(Self::now_ms(), head.deadline_ms, self.budget_ms) {
                break;
            }
            if let Some(Reverse(pending)) = self.pending.pop() {
                let engine = self.registry.get_or_create(pending.request.client_id);
                engine.process_incoming_request(&pending.request);
            }
        }
    }

    /// Time until the earliest pending request becomes due.
    fn next_wakeup(&self) -> Option<Duration> {
        self.pending.peek().map(|Reverse(head)| {
            let fire_at = head.deadline_ms - self.budget_ms;
            let delta = fire_at - Self::now_ms();
            if delta <= 0.0 {
                Duration::ZERO
            } else {
                Duration::from_millis(delta.ceil() as u64)
            }
        })
    }

    /// Run until process shutdown. Non-blocking progress on every source;
    /// the select suspension is the only wait point.
    pub async fn run(mut self) {
        info!("Dispatch loop started");
        loop {
            self.fire_due_requests();
            let wakeup = self.next_wakeup();
            tokio::select! {
                biased;
                Some(stream) = self.conn_rx.recv() => {
                    let ctx = self.router_ctx.clone();
                    tokio::spawn(router::handle_connection(stream, ctx));
                }
                Some(request) = self.request_rx.recv() => self.admit(request),
                Some(event) = self.event_rx.recv() => {
                    let engine = self.registry.get_or_create(event.client_id());
                    engine.process_incoming_event(event);
                }
                _ = deadline_sleep(wakeup) => {}
                else => break,
            }
        }
        info!("Dispatch loop stopped");
    }
}

async fn deadline_sleep(wakeup: Option<Duration>) {
    match wakeup {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}
