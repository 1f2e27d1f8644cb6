use mailparse::{MailAddr, addrparse_header, parse_header};

pub fn decode_subject(raw: &[u8]) -> String {
    // mailparse expects a full "Key: value" header line
    let mut line = b"Subject: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    match parse_header(&line) {
        Ok((h, _idx)) => h.get_value(), // decodes RFC 2047
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Split a raw `From` value into `(lower-cased address, display name)`.
/// Only the first mailbox counts; groups contribute their first member.
pub fn parse_sender(raw: &str) -> (String, String) {
    let mut line = b"From: ".to_vec();
    line.extend_from_slice(raw.as_bytes());
    line.extend_from_slice(b"\r\n");

    let first = parse_header(&line)
        .ok()
        .and_then(|(h, _)| addrparse_header(&h).ok())
        .and_then(|list| {
            list.iter().find_map(|addr| match addr {
                MailAddr::Single(info) => Some(info.clone()),
                MailAddr::Group(group) => group.addrs.first().cloned(),
            })
        });

    match first {
        Some(info) => (
            info.addr.trim().to_lowercase(),
            info.display_name.unwrap_or_default().trim().to_string(),
        ),
        None => (raw.trim().to_lowercase(), String::new()),
    }
}
