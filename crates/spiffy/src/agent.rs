//! In-page agent script.
//!
//! The agent stays thin: it subscribes to the signal catalog and
//! `popstate` on `window`, and logs raw records tagged with the location at
//! dispatch time. URL matching, buffering and reset rules all run in the
//! Rust recorder after a [`BridgeCall::Drain`](crate::bridge::BridgeCall).

use crate::bridge::AGENT_GLOBAL;
use crate::signal::SignalName;

const TEMPLATE: &str = r#"(() => {
  if (window.__GLOBAL__) return;

  const SIGNALS = __SIGNALS__;
  const log = [];
  let seq = 0;

  const jsonSafe = (detail) => {
    if (detail === null || typeof detail !== 'object') return {};
    try {
      const copy = JSON.parse(JSON.stringify(detail));
      return copy && typeof copy === 'object' && !Array.isArray(copy) ? copy : {};
    } catch (_) {
      return {};
    }
  };

  const onSignal = (event) => {
    const detail = jsonSafe(event.detail);
    if (!detail.time) {
      detail.time = Date.now();
      if (event.detail && typeof event.detail === 'object' && !event.detail.time) {
        try { event.detail.time = detail.time; } catch (_) {}
      }
    }
    log.push({ kind: 'signal', seq: seq++, name: event.type, href: window.location.href, detail });
  };

  const onNavigation = () => {
    log.push({ kind: 'navigation', seq: seq++, href: window.location.href });
  };

  SIGNALS.forEach((name) => window.addEventListener(name, onSignal));
  window.addEventListener('popstate', onNavigation);

  const handle = {
    call(request) {
      switch (request && request.method) {
        case 'drain':
          return { kind: 'records', value: log.splice(0, log.length) };
        case 'location':
          return { kind: 'location', value: window.location.href };
        case 'destroy':
          SIGNALS.forEach((name) => window.removeEventListener(name, onSignal));
          window.removeEventListener('popstate', onNavigation);
          log.length = 0;
          delete window.__GLOBAL__;
          return { kind: 'destroyed', value: true };
        default:
          throw new Error('unknown bridge method: ' + JSON.stringify(request));
      }
    },
  };

  Object.defineProperty(window, '__GLOBAL__', { value: handle, configurable: true });
})();
"#;

/// Render the agent script
///
/// Safe to evaluate more than once per document; only the first evaluation
/// installs listeners.
#[must_use]
pub fn script() -> String {
    let signals: Vec<&str> = SignalName::ALL.iter().map(SignalName::as_str).collect();
    let signals = serde_json::Value::from(signals).to_string();
    TEMPLATE
        .replace("__GLOBAL__", AGENT_GLOBAL)
        .replace("__SIGNALS__", &signals)
}
