use std::net::IpAddr;

use ipnet::IpNet;

use crate::conf::ConfigError;
use crate::parser::traits::IpExclusion;

#[derive(Debug, Clone, PartialEq, Eq)]
enum IpRule {
    Net(IpNet),
    /// Inclusive `start-end`, both of the same family
    Range(IpAddr, IpAddr),
}

impl IpRule {
    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let entry = entry.trim();
        let invalid = || ConfigError::InvalidIpRange(entry.to_string());

        if let Some((start, end)) = entry.split_once('-') {
            let start: IpAddr = start.trim().parse().map_err(|_| invalid())?;
            let end: IpAddr = end.trim().parse().map_err(|_| invalid())?;
            if start.is_ipv4() != end.is_ipv4() || start > end {
                return Err(invalid());
            }
            return Ok(IpRule::Range(start, end));
        }
        if entry.contains('/') {
            return entry.parse::<IpNet>().map(IpRule::Net).map_err(|_| invalid());
        }
        let addr: IpAddr = entry.parse().map_err(|_| invalid())?;
        let prefix = if addr.is_ipv4() { 32 } else { 128 };
        IpNet::new(addr, prefix).map(IpRule::Net).map_err(|_| invalid())
    }

    fn contains(&self, addr: &IpAddr) -> bool {
        match self {
            IpRule::Net(net) => net.contains(addr),
            IpRule::Range(start, end) => {
                start.is_ipv4() == addr.is_ipv4() && start <= addr && addr <= end
            }
        }
    }
}

/// Hosts to leave out, as single addresses, CIDR blocks or inclusive
/// `start-end` ranges.
#[derive(Debug, Clone, Default)]
pub struct IpRangeFilter {
    rules: Vec<IpRule>,
}

impl IpRangeFilter {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Result<Self, ConfigError> {
        let rules = entries
            .iter()
            .map(|e| IpRule::parse(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl IpExclusion for IpRangeFilter {
    fn is_excluded(&self, host: &str) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        match host.parse::<IpAddr>() {
            Ok(addr) => self.rules.iter().any(|r| r.contains(&addr)),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_excludes_nothing() {
        let f = IpRangeFilter::new::<&str>(&[]).unwrap();
        assert!(f.is_empty());
        assert!(!f.is_excluded("127.0.0.1"));
    }

    #[test]
    fn test_single_address() {
        let f = IpRangeFilter::new(&["10.0.0.1"]).unwrap();
        assert!(f.is_excluded("10.0.0.1"));
        assert!(!f.is_excluded("10.0.0.2"));
    }

    #[test]
    fn test_cidr_block() {
        let f = IpRangeFilter::new(&["192.168.0.0/16", "2001:db8::/32"]).unwrap();
        assert!(f.is_excluded("192.168.44.3"));
        assert!(f.is_excluded("2001:db8::1"));
        assert!(!f.is_excluded("192.169.0.1"));
    }

    #[test]
    fn test_inclusive_range() {
        let f = IpRangeFilter::new(&["10.0.0.5-10.0.0.9"]).unwrap();
        assert!(f.is_excluded("10.0.0.5"));
        assert!(f.is_excluded("10.0.0.9"));
        assert!(!f.is_excluded("10.0.0.10"));
        assert!(!f.is_excluded("::1"), "Other family never matches");
    }

    #[test]
    fn test_invalid_entries() {
        for bad in ["nope", "10.0.0.9-10.0.0.5", "10.0.0.1-::1", "10.0.0.0/33"] {
            assert!(
                matches!(IpRangeFilter::new(&[bad]), Err(ConfigError::InvalidIpRange(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_non_ip_host_is_not_excluded() {
        let f = IpRangeFilter::new(&["0.0.0.0/0"]).unwrap();
        assert!(!f.is_excluded("example.com"));
    }
}
