use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Host name lookups used when turning a reference into `host:port`.
pub trait NameResolver {
    /// Reverse lookup of an address.
    fn reverse(&self, addr: Ipv4Addr) -> Option<String>;

    /// Fully qualified form of an unqualified host name.
    fn qualify(&self, host: &str) -> Option<String>;
}

/// Resolver that never finds anything, so every host is used verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl NameResolver for NoResolver {
    fn reverse(&self, _addr: Ipv4Addr) -> Option<String> {
        None
    }

    fn qualify(&self, _host: &str) -> Option<String> {
        None
    }
}

/// Resolver backed by the operating system's name service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl NameResolver for SystemResolver {
    fn reverse(&self, addr: Ipv4Addr) -> Option<String> {
        reverse_lookup(addr)
    }

    fn qualify(&self, host: &str) -> Option<String> {
        let addr = (host, 0)
            .to_socket_addrs()
            .ok()?
            .find_map(|sa| match sa.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })?;

        let name = reverse_lookup(addr)?;
        let prefix = format!("{host}.");
        name.starts_with(&prefix).then_some(name)
    }
}

/// Buffer size for a host name returned by `getnameinfo`.
#[cfg(unix)]
const MAX_HOST_LEN: usize = 1025;

#[cfg(unix)]
fn reverse_lookup(addr: Ipv4Addr) -> Option<String> {
    use std::ffi::CStr;
    use std::mem;

    // SAFETY: sockaddr_in is plain old data; all-zero is a valid value.
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_addr.s_addr = u32::from_ne_bytes(addr.octets());

    let mut host = [0 as libc::c_char; MAX_HOST_LEN];
    // SAFETY: `sa` and `host` outlive the call and the lengths passed match
    // their sizes; getnameinfo NUL-terminates `host` on success.
    let rc = unsafe {
        libc::getnameinfo(
            &sa as *const libc::sockaddr_in as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            host.as_mut_ptr(),
            host.len() as libc::socklen_t,
            std::ptr::null_mut(),
            0,
            libc::NI_NAMEREQD,
        )
    };
    if rc != 0 {
        return None;
    }

    // SAFETY: see above.
    let name = unsafe { CStr::from_ptr(host.as_ptr()) };
    name.to_str().ok().map(str::to_owned)
}

#[cfg(not(unix))]
fn reverse_lookup(_addr: Ipv4Addr) -> Option<String> {
    None
}
