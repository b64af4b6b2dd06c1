//! Web Server 模式（JSON API）。

mod router;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::base_system::context::Config;
use state::AppState;

const DEFAULT_BIND: &str = "127.0.0.1:18524";

pub fn run(config: Config) -> Result<()> {
    let bind_raw = std::env::var("COMIC_WEB_ADDR").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let bind_addrs = parse_bind_addrs(&bind_raw)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run_async(bind_addrs, config))
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(anyhow!("empty bind addr"));
    }

    // Standard formats:
    // - IPv4: 127.0.0.1:18524
    // - IPv6: [::1]:18524
    if let Ok(a) = s.parse::<SocketAddr>() {
        return Ok(a);
    }

    // Tolerate missing brackets for IPv6, e.g. "::1:18524".
    // We interpret the last ':' segment as port if it's all digits.
    if !s.starts_with('[')
        && s.contains(':')
        && let Some((host, port)) = s.rsplit_once(':')
        && !host.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
        && host.contains(':')
    {
        let wrapped = format!("[{host}]:{port}");
        if let Ok(a) = wrapped.parse::<SocketAddr>() {
            return Ok(a);
        }
    }

    Err(anyhow!(
        "invalid COMIC_WEB_ADDR: '{s}'. Use '127.0.0.1:18524' or '[::1]:18524' (IPv6 needs brackets). For multiple binds, separate by comma: '0.0.0.0:18524,[::]:18524'."
    ))
}

fn parse_bind_addrs(raw: &str) -> Result<Vec<SocketAddr>> {
    let parts: Vec<&str> = raw
        .split([',', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(anyhow!("empty COMIC_WEB_ADDR"));
    }

    let mut out = Vec::with_capacity(parts.len());
    for p in parts {
        let a = parse_bind_addr(p)?;
        if !out.contains(&a) {
            out.push(a);
        }
    }

    Ok(out)
}

async fn run_async(bind_addrs: Vec<SocketAddr>, config: Config) -> Result<()> {
    let state = AppState {
        config: Arc::new(config),
    };

    // Shared shutdown trigger for all listeners.
    let notify = Arc::new(tokio::sync::Notify::new());
    {
        let notify = notify.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            notify.notify_waiters();
        });
    }

    let mut servers = Vec::new();
    for bind in bind_addrs {
        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(l) => l,
            Err(e) => {
                // On some platforms, binding both [::]:PORT and 0.0.0.0:PORT can fail with
                // AddrInUse because the IPv6 listener may already accept IPv4 (dual-stack).
                if !servers.is_empty() && e.kind() == std::io::ErrorKind::AddrInUse {
                    warn!(target: "web", bind = %bind, error = %e, "bind failed (AddrInUse), likely already covered by another listener; skipping");
                    continue;
                }
                return Err(anyhow!(e).context(format!("bind failed: {bind}")));
            }
        };

        info!(target: "web", "API listening on http://{bind}/ (set COMIC_WEB_ADDR to override)");
        println!("API listening on http://{bind}/");

        let app = router::build_router(state.clone());
        let notify = notify.clone();
        servers.push(tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                notify.notified().await;
            })
            .await
        }));
    }

    if servers.is_empty() {
        return Err(anyhow!("no listeners started (check COMIC_WEB_ADDR)"));
    }

    println!("Press Ctrl+C to stop.");

    for h in servers {
        h.await
            .map_err(|e| anyhow!("server task join failed: {e}"))?
            .map_err(|e| anyhow!(e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_bracketed_addrs() {
        assert!(parse_bind_addr("127.0.0.1:18524").is_ok());
        assert!(parse_bind_addr("[::1]:18524").is_ok());
        assert!(parse_bind_addr("::1:18524").is_ok());
        assert!(parse_bind_addr("not an addr").is_err());
    }

    #[test]
    fn dedupes_multi_bind_list() {
        let list = parse_bind_addrs("0.0.0.0:18524, 0.0.0.0:18524,[::]:18524").unwrap();
        assert_eq!(list.len(), 2);
    }
}
