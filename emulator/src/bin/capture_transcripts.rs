use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    for profile in TranscriptProfile::ALL {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    session.boot()?;
    match profile {
        TranscriptProfile::Reference => record_reference(&mut session),
        TranscriptProfile::SubGhz => record_sub_ghz(&mut session),
        TranscriptProfile::FskOnly => record_fsk_only(&mut session),
    }
}

fn record_reference(session: &mut Session) -> io::Result<()> {
    for command in [
        "help", "status", "send", "send", "time", "mtu", "downlink hello", "switch", "status",
        "fault submit busy", "send", "fault clear", "reset", "wake", "status",
    ] {
        session.handle_command(command)?;
    }
    Ok(())
}

fn record_sub_ghz(session: &mut Session) -> io::Result<()> {
    for command in [
        "status",
        "send",
        "mtu",
        "stack-error timeout",
        "fault stop radio",
        "sleep",
        "status",
        "fault clear",
        "wake",
        "idle",
        "wake",
    ] {
        session.handle_command(command)?;
    }
    Ok(())
}

fn record_fsk_only(session: &mut Session) -> io::Result<()> {
    for command in [
        "switch", "connect", "send", "default-link", "fault start busy", "reset", "wake",
    ] {
        session.handle_command(command)?;
    }
    Ok(())
}
