use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// IP utility functions for formatting addresses in fact documents

/// Attach the prefix length of `network` to `addr` ("192.168.0.2/24")
pub fn with_network_prefix(addr: Ipv4Addr, network: &Ipv4Net) -> Ipv4Net {
    // prefix_len comes from a valid network, so it is always <= 32
    Ipv4Net::new(addr, network.prefix_len()).unwrap_or_else(|_| Ipv4Net::from(addr))
}

/// Split an interface address into its textual address and netmask
///
/// # Examples
/// ```
/// use deployfacts::utils::ip_utils::address_and_netmask;
///
/// let net = "192.168.0.2/24".parse().unwrap();
/// assert_eq!(
///     address_and_netmask(&net),
///     ("192.168.0.2".to_string(), "255.255.255.0".to_string())
/// );
/// ```
pub fn address_and_netmask(net: &Ipv4Net) -> (String, String) {
    (net.addr().to_string(), net.netmask().to_string())
}

/// Interface name for a device, dot-joined with the VLAN tag when present
///
/// # Examples
/// ```
/// use deployfacts::utils::ip_utils::make_interface_name;
///
/// assert_eq!(make_interface_name(Some("eth0"), Some(101)), Some("eth0.101".to_string()));
/// assert_eq!(make_interface_name(Some("eth0"), None), Some("eth0".to_string()));
/// assert_eq!(make_interface_name(None, Some(101)), None);
/// ```
pub fn make_interface_name(dev: Option<&str>, vlan: Option<u16>) -> Option<String> {
    match (dev, vlan) {
        (Some(dev), Some(vlan)) => Some(format!("{}.{}", dev, vlan)),
        (Some(dev), None) => Some(dev.to_string()),
        (None, _) => None,
    }
}
