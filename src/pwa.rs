use serde_json::{json, Value};

/// Web app manifest so the grid can be installed on a tablet home screen.
pub fn manifest(title: &str) -> Value {
    json!({
        "name": title,
        "short_name": "Appointments",
        "start_url": "/",
        "display": "standalone",
        "background_color": "#ffffff",
        "theme_color": "#e11d48",
        "icons": [],
    })
}

// Network only: the grid must never be served from a stale cache.
pub const SERVICE_WORKER: &str = r#"self.addEventListener("install", () => self.skipWaiting());
self.addEventListener("activate", (event) => {
  event.waitUntil(
    caches.keys()
      .then((keys) => Promise.all(keys.map((key) => caches.delete(key))))
      .then(() => self.clients.claim())
  );
});
self.addEventListener("fetch", (event) => {
  event.respondWith(fetch(event.request));
});
"#;
