pub mod admin;
pub mod error;
pub mod feed;
pub mod reset;
pub mod session;
pub mod vote;

#[cfg(test)]
mod testing;

mod util {
    pub mod cookie;
}

use admin::Credentials;
use core::convert::Infallible;
use db::Repository;
use error::{Error, Result};
use feed::{Feed, KEEP_ALIVE};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full, Limited, StreamBody};
use hyper::{
    body::Bytes,
    header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, SET_COOKIE},
    HeaderMap, Method, Request, Response, StatusCode,
};
use model::{Edit, Eligibility, Poll, Session, Standing, Timestamp};
use reset::Confirmation;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use session::{Login, Sessions};
use std::time::{SystemTime, UNIX_EPOCH};
use vote::{Ballots, Strategy};

pub type Body = UnsyncBoxBody<Bytes, Infallible>;

/// Request bodies larger than this are rejected outright.
const MAX_BODY: usize = 64 * 1024;

fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
}

/// Poll as shown to clients, with the tallies already worked out.
#[derive(Serialize)]
struct View<'p> {
    #[serde(flatten)]
    poll: &'p Poll,
    total: u64,
    leader: Option<u32>,
    standings: Vec<Standing<'p>>,
}

impl<'p> From<&'p Poll> for View<'p> {
    fn from(poll: &'p Poll) -> Self {
        Self { poll, total: poll.total_votes(), leader: poll.leader().map(|opt| opt.id), standings: poll.standings() }
    }
}

#[derive(Serialize)]
struct Message<'m> {
    error: &'m str,
}

#[derive(Serialize)]
struct Status {
    eligible: bool,
    hours: u64,
    minutes: u64,
}

#[derive(Serialize)]
struct Welcome<'n> {
    name: Option<&'n str>,
    admin: bool,
}

#[derive(Deserialize)]
struct VoterLogin {
    name: String,
}

#[derive(Deserialize)]
struct AdminLogin {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct Ballot {
    option: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Scope {
    Votes,
    Everything,
}

#[derive(Deserialize)]
struct ResetRequest {
    scope: Scope,
    #[serde(default)]
    confirmations: u8,
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let (status, bytes) = match serde_json::to_vec(value) {
        Ok(bytes) => (status, Bytes::from(bytes)),
        Err(err) => {
            log::error!("cannot serialize response: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, Bytes::new())
        }
    };
    let mut res = Response::new(Full::new(bytes).boxed_unsync());
    *res.status_mut() = status;
    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

fn view(poll: &Poll) -> Response<Body> {
    json(StatusCode::OK, &View::from(poll))
}

fn failure(err: &Error) -> Response<Body> {
    match err {
        Error::Store(_) | Error::Contention => log::error!("request failed: {err}"),
        _ => log::debug!("request rejected: {err}"),
    }
    let message = err.to_string();
    json(err.status(), &Message { error: &message })
}

async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => {
            log::warn!("cannot read request body: {err}");
            Err(Error::BadRequest)
        }
    }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|err| {
        log::debug!("malformed request body: {err}");
        Error::BadRequest
    })
}

/// Shared state behind every request.
pub struct App {
    repo: Repository,
    sessions: Sessions,
    ballots: Ballots,
    credentials: Credentials,
    strategy: Strategy,
}

impl App {
    pub fn new(repo: Repository, credentials: Credentials, strategy: Strategy) -> Self {
        Self { repo, sessions: Sessions::default(), ballots: Ballots::default(), credentials, strategy }
    }

    pub async fn respond<B>(&self, req: Request<B>) -> Response<Body>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let body = match read_body(body).await {
            Ok(body) => body,
            Err(err) => return failure(&err),
        };
        let result = match (&parts.method, parts.uri.path()) {
            (&Method::GET, "/poll") => self.poll().await,
            (&Method::GET, "/poll/events") => self.events(&parts.headers).await,
            (&Method::POST, "/login") => self.login(&body).await,
            (&Method::POST, "/admin/login") => self.admin_login(&body).await,
            (&Method::POST, "/logout") => Ok(self.logout(&parts.headers)),
            (&Method::GET, "/eligibility") => self.eligibility(&parts.headers).await,
            (&Method::POST, "/vote") => self.vote(&parts.headers, &body).await,
            (&Method::PUT, "/admin/poll") => self.publish(&parts.headers, &body).await,
            (&Method::POST, "/admin/reset") => self.reset(&parts.headers, &body).await,
            (method, path) => {
                log::debug!("no route for {method} {path}");
                Err(Error::NotFound)
            }
        };
        result.unwrap_or_else(|err| failure(&err))
    }

    fn session(&self, headers: &HeaderMap) -> Result<Session> {
        let id = util::cookie::extract_session(headers).ok_or(Error::Unauthenticated)?;
        self.sessions.get(&id, now()).ok_or(Error::Unauthenticated)
    }

    fn voter(&self, headers: &HeaderMap) -> Result<Box<str>> {
        match self.session(headers)? {
            Session::Voter { name } => Ok(name),
            Session::Admin => Err(Error::Unauthenticated),
        }
    }

    fn admin(&self, headers: &HeaderMap) -> Result<()> {
        if self.session(headers)?.is_admin() {
            Ok(())
        } else {
            Err(Error::Unauthenticated)
        }
    }

    fn welcome(&self, session: Session) -> Response<Body> {
        let welcome = Welcome { name: session.as_voter(), admin: session.is_admin() };
        let mut res = json(StatusCode::OK, &welcome);
        let id = self.sessions.open(session, now());
        res.headers_mut().insert(SET_COOKIE, util::cookie::session_cookie(id));
        res
    }

    async fn poll(&self) -> Result<Response<Body>> {
        let poll = self.repo.get_poll().await?;
        Ok(view(&poll))
    }

    async fn events(&self, headers: &HeaderMap) -> Result<Response<Body>> {
        let mut feed = Feed::open(&self.repo, KEEP_ALIVE).await?;
        if let Some(id) = util::cookie::extract_session(headers) {
            feed.bind(&self.sessions, id);
        }

        let mut res = Response::new(StreamBody::new(feed).boxed_unsync());
        let headers = res.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        Ok(res)
    }

    async fn login(&self, body: &[u8]) -> Result<Response<Body>> {
        let VoterLogin { name } = parse(body)?;
        match session::login_voter(&self.repo, &name, now()).await? {
            Login::Accepted(session) => Ok(self.welcome(session)),
            Login::Wait(wait) => Err(Error::Ineligible(wait)),
        }
    }

    async fn admin_login(&self, body: &[u8]) -> Result<Response<Body>> {
        let AdminLogin { username, password } = parse(body)?;
        let session = self.credentials.login(&username, &password)?;
        Ok(self.welcome(session))
    }

    fn logout(&self, headers: &HeaderMap) -> Response<Body> {
        if let Some(id) = util::cookie::extract_session(headers) {
            self.sessions.close(&id, &self.repo);
        }
        let mut res = Response::new(Full::new(Bytes::new()).boxed_unsync());
        *res.status_mut() = StatusCode::NO_CONTENT;
        res.headers_mut().insert(SET_COOKIE, util::cookie::expired_cookie());
        res
    }

    async fn eligibility(&self, headers: &HeaderMap) -> Result<Response<Body>> {
        let name = self.voter(headers)?;
        let voter = self.repo.get_voter(&name).await?;
        let status = match Eligibility::check(voter.as_ref(), now()) {
            Eligibility::Eligible => Status { eligible: true, hours: 0, minutes: 0 },
            Eligibility::Wait(wait) => Status { eligible: false, hours: wait.hours, minutes: wait.minutes },
        };
        Ok(json(StatusCode::OK, &status))
    }

    async fn vote(&self, headers: &HeaderMap, body: &[u8]) -> Result<Response<Body>> {
        let name = self.voter(headers)?;
        let Ballot { option } = parse(body)?;
        let poll = self.ballots.cast(&self.repo, self.strategy, &name, option, now()).await?;
        Ok(view(&poll))
    }

    async fn publish(&self, headers: &HeaderMap, body: &[u8]) -> Result<Response<Body>> {
        self.admin(headers)?;
        let edit: Edit = parse(body)?;
        let poll = admin::publish(&self.repo, edit).await?;
        Ok(view(&poll))
    }

    async fn reset(&self, headers: &HeaderMap, body: &[u8]) -> Result<Response<Body>> {
        self.admin(headers)?;
        let ResetRequest { scope, confirmations } = parse(body)?;
        let confirmation = Confirmation::from(confirmations);
        let poll = match scope {
            Scope::Votes => reset::reset_votes_only(&self.repo, confirmation).await?,
            Scope::Everything => reset::reset_everything(&self.repo, confirmation).await?,
        };
        Ok(view(&poll))
    }
}
