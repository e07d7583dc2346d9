//! `flow serve` — start a persistent HTTP server and/or file watcher.
//! Delegates to the flow-server crate.

use std::sync::Arc;

use flow_output::OutputFormatter;
use flow_server::FlowServer;

pub fn run(_formatter: &dyn OutputFormatter, verbose: bool, http: bool, watch: bool) -> i32 {
    if !http && !watch {
        eprintln!("flow serve: at least one of --http or --watch required");
        return 2;
    }

    let root_dir = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("flow serve: failed to create runtime: {e}");
            return 2;
        }
    };

    rt.block_on(async {
        if verbose {
            eprintln!("flow serve: building initial model from {:?}", root_dir);
        }
        let server = Arc::new(FlowServer::build(root_dir.clone()));

        let _watcher = if watch {
            match flow_server::watcher::start_watching(server.clone()) {
                Ok(watcher) => {
                    if verbose {
                        eprintln!("flow serve: file watcher started on {:?}", root_dir);
                    }
                    Some(watcher)
                }
                Err(e) => {
                    eprintln!("flow serve: watcher failed: {e}");
                    return 2;
                }
            }
        } else {
            None
        };

        if http {
            let port = 4816;
            let addr = format!("127.0.0.1:{port}");
            if verbose {
                eprintln!("flow serve: HTTP on http://{addr}");
            }
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("flow serve: failed to bind {addr}: {e}");
                    return 2;
                }
            };
            let app = flow_server::http::router(server);
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("flow serve: HTTP error: {e}");
                return 2;
            }
        } else {
            // watch-only: block forever so the watcher keeps running.
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }
        }

        0
    })
}
