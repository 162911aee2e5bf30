//! Proxy routing.
//!
//! Rewrites a request descriptor so the hop goes through a proxy:
//!
//! | proxy scheme | target | result                                         |
//! |--------------|--------|------------------------------------------------|
//! | `socks*`     | any    | SOCKS connector, TLS on top for https targets  |
//! | http(s)      | http   | forward proxy: connect to the proxy, absolute-form path |
//! | http(s)      | https  | CONNECT tunnel, port 443 unless explicit       |

use url::Url;

use crate::auth::basic_auth_raw;
use crate::error::Result;
use crate::request::{Protocol, RequestDescriptor};
use crate::target::parse_url;
use crate::timeouts::Timeouts;
use crate::transport::connector::Connector;
use crate::transport::socks::SocksAgent;
use crate::transport::tunnel::TunnelAgent;
use crate::transport::url_credentials;

/// Route `descriptor` (built for `target`) through `proxy`.
pub fn apply_proxy(
    descriptor: &mut RequestDescriptor,
    proxy: &str,
    target: &Url,
    timeouts: &Timeouts,
) -> Result<()> {
    let proxy_url = parse_url(proxy)?;

    if proxy_url.scheme().starts_with("socks") {
        let agent = SocksAgent::new(&proxy_url)?;
        tracing::debug!(
            "Routing {} via SOCKS {:?} proxy {}:{}",
            target,
            agent.version(),
            agent.proxy_addr().0,
            agent.proxy_addr().1
        );
        descriptor.connector = Connector::Socks(agent);
        return Ok(());
    }

    match descriptor.protocol {
        Protocol::Http => {
            let protocol = Protocol::from_scheme(proxy_url.scheme())?;
            let mut absolute = target.clone();
            absolute.set_fragment(None);

            tracing::debug!("Forwarding {} via proxy {}", absolute, proxy_url);
            descriptor.protocol = protocol;
            descriptor.host = proxy_url.host_str().unwrap_or_default().to_string();
            descriptor.port = proxy_url.port();
            descriptor.path = absolute.to_string();
            if let Some(credentials) = url_credentials(&proxy_url) {
                descriptor
                    .headers
                    .upsert("Proxy-Authorization", basic_auth_raw(&credentials));
            }
        }
        Protocol::Https => {
            let agent = TunnelAgent::new(&proxy_url, descriptor.tls.clone())?.with_timeout(timeouts.tunnel);
            tracing::debug!("Tunneling {} via proxy {}", target, proxy_url);
            descriptor.connector = Connector::Tunnel(agent);
            descriptor.port.get_or_insert(443);
        }
    }
    Ok(())
}
