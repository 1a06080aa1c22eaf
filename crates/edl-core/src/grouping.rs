//! Collapse runs of consecutive IPv4 indicators into `first-last` ranges.
//!
//! Firewalls count EDL entries against a hard limit, so a /24 worth of
//! individually listed addresses is better served as one range entry.

use crate::types::Indicator;
use std::net::Ipv4Addr;

/// Group consecutive IPv4 indicators into ranges.
///
/// IPv4 indicators come first, sorted by address, one entry per run. The
/// entry for a run keeps the attributes of its lowest address. Everything
/// that is not an IPv4 address follows in its original order.
pub fn group_ips(iocs: Vec<Indicator>) -> Vec<Indicator> {
    let mut ips: Vec<(u32, Indicator)> = Vec::new();
    let mut others = Vec::new();

    for ioc in iocs {
        match ioc.value().parse::<Ipv4Addr>() {
            Ok(ip) => ips.push((u32::from(ip), ioc)),
            Err(_) => others.push(ioc),
        }
    }

    ips.sort_by_key(|(addr, _)| *addr);
    ips.dedup_by_key(|(addr, _)| *addr);

    let mut grouped = Vec::with_capacity(ips.len() + others.len());
    let mut iter = ips.into_iter();

    if let Some((first_addr, first)) = iter.next() {
        let mut run_start = first_addr;
        let mut run_end = first_addr;
        let mut head = first;

        for (addr, ioc) in iter {
            if run_end.checked_add(1) == Some(addr) {
                run_end = addr;
                continue;
            }
            grouped.push(range_indicator(head, run_start, run_end));
            run_start = addr;
            run_end = addr;
            head = ioc;
        }
        grouped.push(range_indicator(head, run_start, run_end));
    }

    grouped.extend(others);
    grouped
}

fn range_indicator(mut head: Indicator, start: u32, end: u32) -> Indicator {
    if start != end {
        head.set_value(format!("{}-{}", Ipv4Addr::from(start), Ipv4Addr::from(end)));
    }
    head
}
