use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_client::client::{Client, ClientHandle};
use hickory_client::proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_client::proto::runtime::TokioRuntimeProvider;
use hickory_client::proto::udp::UdpClientStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LookupError, ScanError};

/// A candidate that resolved, paired with one of its addresses.
///
/// `hostname` is always the name that was queried, never a CNAME target
/// reached along the way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub hostname: String,
    pub address: IpAddr,
}

/// The two queries the resolver needs from a DNS server.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Targets of the CNAME records held by `name`, in answer order.
    async fn cname(&self, name: &str) -> Result<Vec<String>, LookupError>;

    /// Addresses of the A records returned for `name`.
    async fn a(&self, name: &str) -> Result<Vec<Ipv4Addr>, LookupError>;
}

/// Talks to a single DNS server over UDP using hickory's client.
#[derive(Clone)]
pub struct DnsLookup {
    client: Client,
}

impl DnsLookup {
    pub async fn connect(server: SocketAddr, timeout: Duration) -> Result<Self, ScanError> {
        let conn = UdpClientStream::builder(server, TokioRuntimeProvider::default())
            .with_timeout(Some(timeout))
            .build();
        let (client, bg) = Client::connect(conn)
            .await
            .map_err(|e| ScanError::Connect {
                server,
                reason: e.to_string(),
            })?;
        tokio::spawn(bg);

        Ok(Self { client })
    }

    async fn query(&self, name: &str, record_type: RecordType) -> Result<Vec<RData>, LookupError> {
        let name = to_name(name)?;
        let mut client = self.client.clone();

        let resp = client
            .query(name, DNSClass::IN, record_type)
            .await
            .map_err(|e| LookupError::Query(e.to_string()))?;

        if resp.answers().is_empty() {
            return Err(LookupError::NoAnswer);
        }

        Ok(resp.answers().iter().map(|record| record.data().clone()).collect())
    }
}

#[async_trait]
impl Lookup for DnsLookup {
    async fn cname(&self, name: &str) -> Result<Vec<String>, LookupError> {
        let answers = self.query(name, RecordType::CNAME).await?;

        Ok(answers
            .into_iter()
            .filter_map(|data| match data {
                RData::CNAME(cname) => Some(cname.0.to_utf8()),
                _ => None,
            })
            .collect())
    }

    async fn a(&self, name: &str) -> Result<Vec<Ipv4Addr>, LookupError> {
        let answers = self.query(name, RecordType::A).await?;

        Ok(answers
            .into_iter()
            .filter_map(|data| match data {
                RData::A(a) => Some(a.0),
                _ => None,
            })
            .collect())
    }
}

fn to_name(name: &str) -> Result<Name, LookupError> {
    let fqdn = if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    };

    Name::from_str(&fqdn).map_err(|_| LookupError::InvalidName(name.to_string()))
}

/// Resolves one candidate: chases CNAMEs, then collects A records.
pub struct Resolver<L> {
    lookup: L,
    max_cname_depth: usize,
}

impl<L: Lookup> Resolver<L> {
    pub fn new(lookup: L, max_cname_depth: usize) -> Self {
        Self {
            lookup,
            max_cname_depth,
        }
    }

    /// Every returned finding carries `candidate` as its hostname. An empty
    /// vector means the candidate did not resolve, for whatever reason.
    pub async fn resolve(&self, candidate: &str) -> Vec<Finding> {
        let mut current = candidate.to_string();
        let mut hops = 0;

        loop {
            match self.lookup.cname(&current).await {
                Ok(targets) => match targets.into_iter().next() {
                    Some(target) => {
                        if hops == self.max_cname_depth {
                            debug!(candidate, hops, "CNAME chain too long, giving up");
                            return Vec::new();
                        }
                        hops += 1;
                        current = target;
                    }
                    None => break,
                },
                Err(e) => {
                    debug!(candidate, name = %current, error = %e, "CNAME lookup stopped");
                    break;
                }
            }
        }

        match self.lookup.a(&current).await {
            Ok(addrs) => addrs
                .into_iter()
                .map(|ip| Finding {
                    hostname: candidate.to_string(),
                    address: IpAddr::V4(ip),
                })
                .collect(),
            Err(e) => {
                debug!(candidate, name = %current, error = %e, "no A records");
                Vec::new()
            }
        }
    }
}
