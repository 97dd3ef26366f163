//! Keep-alive HTTP endpoint.
//!
//! Hosting platforms that sleep idle deployments probe the process over
//! HTTP; a static 200 on `/` is enough to keep it awake. This serves
//! continuously and independently of automation runs.

use warp::Filter;

/// Serve `GET /` forever on the given port, bound to all interfaces.
pub async fn serve(port: u16) {
    let root = warp::path::end()
        .and(warp::get())
        .map(|| "Aternos bot is running!");

    eprintln!("[keepalive] listening on 0.0.0.0:{port}");
    warp::serve(root).run(([0, 0, 0, 0], port)).await;
}
