use crate::session::Sessions;
use core::{
    convert::Infallible,
    pin::Pin,
    task::{self, Context},
    time::Duration,
};
use db::{Repository, Subscription};
use futures_util::Stream;
use hyper::body::{Bytes, Frame};
use model::Poll;
use tokio::{
    sync::mpsc,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use uuid::Uuid;

/// Idle time after which a comment line is sent so that proxies keep the connection open.
pub const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Server-sent event stream of poll changes. Dropping the feed (e.g. when the client disconnects)
/// releases its subscription.
pub struct Feed {
    rx: mpsc::UnboundedReceiver<Bytes>,
    keep_alive: Interval,
    repo: Repository,
    subscription: Subscription,
    /// Session that owns the feed, if any.
    owner: Option<(Sessions, Uuid)>,
}

fn event(poll: &Poll) -> Option<Bytes> {
    let json = serde_json::to_string(poll).ok()?;
    Some(Bytes::from(format!("data: {json}\n\n")))
}

impl Feed {
    pub async fn open(repo: &Repository, keep_alive: Duration) -> db::error::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = repo
            .subscribe(move |poll| {
                if let Some(chunk) = event(&poll) {
                    // A closed receiver means the feed is being dropped along with the subscription.
                    let _ = tx.send(chunk);
                }
            })
            .await?;

        let mut keep_alive = time::interval_at(Instant::now() + keep_alive, keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self { rx, keep_alive, repo: repo.clone(), subscription, owner: None })
    }

    pub const fn subscription(&self) -> Subscription {
        self.subscription
    }

    /// Hands the feed to a session so that logging out ends it. Unknown sessions are ignored.
    pub fn bind(&mut self, sessions: &Sessions, id: Uuid) {
        if sessions.attach(&id, self.subscription) {
            self.owner = Some((sessions.clone(), id));
        }
    }
}

impl Stream for Feed {
    type Item = Result<Frame<Bytes>, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> task::Poll<Option<Self::Item>> {
        if let task::Poll::Ready(chunk) = self.rx.poll_recv(cx) {
            self.keep_alive.reset();
            return task::Poll::Ready(chunk.map(|chunk| Ok(Frame::data(chunk))));
        }
        self.keep_alive.poll_tick(cx).map(|_| Some(Ok(Frame::data(Bytes::from_static(b":\n\n")))))
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.repo.unsubscribe(self.subscription);
        if let Some((sessions, id)) = self.owner.take() {
            sessions.detach(&id, self.subscription);
        }
    }
}
