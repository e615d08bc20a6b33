use api::{admin::Credentials, vote::Strategy, App};
use db::{FirebaseStore, MemoryStore, Repository, Store};
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{
    convert::Infallible,
    env,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tokio::{net::TcpListener, runtime::Runtime};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse environment variables
    let port = env::var("PORT")?.parse()?;
    let store: Arc<dyn Store> = match env::var("FIREBASE_URL") {
        Ok(url) => {
            let auth = env::var("FIREBASE_AUTH").ok();
            Arc::new(FirebaseStore::new(&url, auth.as_deref())?)
        }
        _ => {
            log::warn!("FIREBASE_URL is not set, so votes only live as long as this process");
            Arc::new(MemoryStore::default())
        }
    };
    let credentials = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
        (Ok(username), Ok(password)) => Credentials::new(username, password),
        _ => Credentials::default(),
    };
    let strategy = match env::var("VOTE_STRATEGY") {
        Ok(name) => Strategy::from_name(&name).ok_or_else(|| anyhow::anyhow!("unknown vote strategy {name}"))?,
        _ => Strategy::default(),
    };

    // Initialize service handler
    let app = App::new(Repository::new(store), credentials, strategy);
    let runtime = Runtime::new()?;
    runtime.block_on(serve(port, Arc::new(app)))
}

async fn serve(port: u16, app: Arc<App>) -> anyhow::Result<()> {
    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => break,
        };

        let app = app.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let app = app.clone();
                async move { Ok::<_, Infallible>(app.respond(req).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                log::warn!("connection with {peer} ended abruptly: {err}");
            }
        });
    }

    log::info!("shutting down");
    Ok(())
}
