// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Login state machine and cached control metadata.
//!
//! A control only accepts one login per access level at a time, and some
//! access levels are refused outright when the client runs in safe mode.
//! This module is the single place that tracks which levels are currently
//! active and holds the `R_VR`/`R_PR` results once read, since both are
//! immutable for the lifetime of a connection and re-reading them on every
//! call would be wasteful.

use std::collections::HashSet;

use log::{info, warn};

use crate::codec::{self, SystemParameters};
use crate::constant::{AccessLevel, ControlVariant, ParRvr, Tag};
use crate::error::Error;
use crate::protocol::Protocol;
use crate::transport::Transport;

fn read_version_field<T: Transport>(proto: &mut Protocol<T>, selector: ParRvr) -> Result<String, Error> {
    let body = proto.send_receive(Tag::RVr, &[selector as u8], &[Tag::SVr])?;
    Ok(codec::decode_nul_terminated(&body, true))
}

fn read_optional_version_field<T: Transport>(proto: &mut Protocol<T>, selector: ParRvr, field: &str) -> String {
    read_version_field(proto, selector).unwrap_or_else(|_| {
        warn!("control did not answer R_VR {}, using \"not supported\"", field);
        "not supported".to_string()
    })
}

/// access levels permitted while the client runs in safe mode
const SAFE_MODE_LEVELS: [AccessLevel; 3] = [
    AccessLevel::Inspect,
    AccessLevel::FileTransfer,
    AccessLevel::Monitor,
];

/// the per-field results of `R_VR`, one NUL-terminated string per sub-selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub control: String,
    pub nc_version: String,
    pub plc_version: String,
    pub options: String,
    pub id: String,
    pub release_type: String,
    pub splc_version: String,
}

impl VersionInfo {
    /// classify the control family from the `CONTROL` version string. The
    /// exact string catalogue a real control can report was not part of the
    /// retrieval pack; this covers the families named in the spec and falls
    /// back to `MillNew` with a warning for anything else, per the spec's
    /// own fallback rule (see DESIGN.md).
    pub fn control_variant(&self) -> ControlVariant {
        let control = self.control.to_ascii_uppercase();
        if control.contains("ITNC") {
            ControlVariant::MillOld
        } else if control.contains("TNC") {
            ControlVariant::MillNew
        } else if control.contains("CNCPILOT") || control.contains("MANUALPLUS") {
            ControlVariant::LatheNew
        } else {
            warn!("unrecognized control string {:?}, assuming MILL_NEW", self.control);
            ControlVariant::MillNew
        }
    }
}

/// tracks active logins and caches the control's version and system
/// parameter tables behind a single `Protocol`.
#[derive(Debug)]
pub struct Session<T: Transport> {
    protocol: Protocol<T>,
    safe_mode: bool,
    active_levels: HashSet<AccessLevel>,
    versions: Option<VersionInfo>,
    system_parameters: Option<SystemParameters>,
}

impl<T: Transport> Session<T> {
    pub fn new(protocol: Protocol<T>, safe_mode: bool) -> Session<T> {
        Session {
            protocol,
            safe_mode,
            active_levels: HashSet::new(),
            versions: None,
            system_parameters: None,
        }
    }

    pub fn protocol(&mut self) -> &mut Protocol<T> {
        &mut self.protocol
    }

    pub fn is_logged_in(&self, level: AccessLevel) -> bool {
        self.active_levels.contains(&level)
    }

    fn check_permitted(&self, level: AccessLevel) -> Result<(), Error> {
        if self.safe_mode && !SAFE_MODE_LEVELS.contains(&level) {
            return Err(Error::Semantic(format!(
                "access level {} is not permitted while running in safe mode",
                level
            )));
        }
        Ok(())
    }

    /// log in at `level`, optionally with a password. A level the client is
    /// already logged in at is a no-op, matching the control's own
    /// behaviour of refusing a duplicate login for the same level.
    pub fn login(&mut self, level: AccessLevel, password: Option<&str>) -> Result<(), Error> {
        self.check_permitted(level)?;
        if self.active_levels.contains(&level) {
            return Ok(());
        }

        let mut payload = Vec::new();
        payload.extend_from_slice(level.login_name().as_bytes());
        payload.push(0);
        if let Some(pw) = password {
            payload.extend_from_slice(pw.as_bytes());
            payload.push(0);
        }

        self.protocol.send_receive_ack(Tag::ALg, &payload)?;
        info!("logged in at level {}", level);
        self.active_levels.insert(level);
        Ok(())
    }

    /// log out of `level`, or every active level when `level` is `None`
    pub fn logout(&mut self, level: Option<AccessLevel>) -> Result<(), Error> {
        let payload = match level {
            Some(l) => {
                let mut p = l.login_name().as_bytes().to_vec();
                p.push(0);
                p
            }
            None => vec![0],
        };
        self.protocol.send_receive_ack(Tag::ALo, &payload)?;
        match level {
            Some(l) => {
                self.active_levels.remove(&l);
            }
            None => self.active_levels.clear(),
        }
        Ok(())
    }

    /// read (and cache) the control's version information. Pass `force` to
    /// bypass the cache and re-read from the control.
    ///
    /// Only `CONTROL` must succeed; the other six sub-selectors are known to
    /// be absent on some control generations (e.g. `RELEASE_TYPE` on a
    /// legacy mill), so a failed read there falls back to `"not supported"`
    /// rather than failing the whole handshake.
    pub fn get_versions(&mut self, force: bool) -> Result<&VersionInfo, Error> {
        if !force && self.versions.is_some() {
            return Ok(self.versions.as_ref().unwrap());
        }

        let control = read_version_field(&mut self.protocol, ParRvr::Control)?;

        let versions = VersionInfo {
            control,
            nc_version: read_optional_version_field(&mut self.protocol, ParRvr::NcVersion, "NC_VERSION"),
            plc_version: read_optional_version_field(&mut self.protocol, ParRvr::PlcVersion, "PLC_VERSION"),
            options: read_optional_version_field(&mut self.protocol, ParRvr::Options, "OPTIONS"),
            id: read_optional_version_field(&mut self.protocol, ParRvr::Id, "ID"),
            release_type: read_optional_version_field(&mut self.protocol, ParRvr::ReleaseType, "RELEASE_TYPE"),
            splc_version: read_optional_version_field(&mut self.protocol, ParRvr::SplcVersion, "SPLC_VERSION"),
        };
        self.versions = Some(versions);
        Ok(self.versions.as_ref().unwrap())
    }

    /// read (and cache) the control's system parameter table
    pub fn get_system_parameters(&mut self, force: bool) -> Result<&SystemParameters, Error> {
        if !force && self.system_parameters.is_some() {
            return Ok(self.system_parameters.as_ref().unwrap());
        }
        let body = self.protocol.send_receive(Tag::RPr, &[], &[Tag::SPr])?;
        let parameters = SystemParameters::decode(&body)?;
        self.system_parameters = Some(parameters);
        Ok(self.system_parameters.as_ref().unwrap())
    }

    pub fn cached_system_parameters(&self) -> Option<&SystemParameters> {
        self.system_parameters.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct MockTransport {
        responses: VecDeque<(Tag, Vec<u8>)>,
    }

    impl Transport for MockTransport {
        fn telegram(
            &mut self,
            tag_bytes: [u8; 2],
            payload: &[u8],
            _buffer_size: usize,
            wait_for_response: bool,
        ) -> Result<Option<(Tag, Vec<u8>)>, Error> {
            let _ = (tag_bytes, payload);
            if !wait_for_response {
                return Ok(None);
            }
            Ok(self.responses.pop_front())
        }

        fn disconnect(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn session_with(responses: Vec<(Tag, Vec<u8>)>, safe_mode: bool) -> Session<MockTransport> {
        let transport = MockTransport {
            responses: responses.into(),
        };
        Session::new(Protocol::new(transport), safe_mode)
    }

    #[test]
    fn login_in_safe_mode_rejects_dnc() {
        let mut session = session_with(vec![], true);
        let err = session.login(AccessLevel::Dnc, None).unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
    }

    #[test]
    fn login_then_logout_tracks_active_levels() {
        let mut session = session_with(
            vec![(Tag::TOk, vec![]), (Tag::TOk, vec![])],
            false,
        );
        session.login(AccessLevel::Inspect, None).unwrap();
        assert!(session.is_logged_in(AccessLevel::Inspect));
        session.logout(Some(AccessLevel::Inspect)).unwrap();
        assert!(!session.is_logged_in(AccessLevel::Inspect));
    }

    #[test]
    fn repeated_login_at_same_level_is_a_no_op() {
        let mut session = session_with(vec![(Tag::TOk, vec![])], false);
        session.login(AccessLevel::Inspect, None).unwrap();
        // no queued response left; a second login must not touch the wire
        session.login(AccessLevel::Inspect, None).unwrap();
    }

    #[test]
    fn control_variant_classifies_itnc_as_mill_old() {
        let versions = VersionInfo {
            control: "iTNC530".into(),
            nc_version: "340494 07".into(),
            plc_version: "".into(),
            options: "".into(),
            id: "".into(),
            release_type: "".into(),
            splc_version: "".into(),
        };
        assert_eq!(versions.control_variant(), ControlVariant::MillOld);
    }

    #[test]
    fn control_variant_falls_back_to_mill_new_for_unrecognized_strings() {
        let versions = VersionInfo {
            control: "SOMETHING_ELSE".into(),
            nc_version: "".into(),
            plc_version: "".into(),
            options: "".into(),
            id: "".into(),
            release_type: "".into(),
            splc_version: "".into(),
        };
        assert_eq!(versions.control_variant(), ControlVariant::MillNew);
    }

    #[test]
    fn get_versions_substitutes_not_supported_for_missing_fields() {
        let mut session = session_with(
            vec![
                (Tag::SVr, b"iTNC530".to_vec()),  // CONTROL
                (Tag::TEr, vec![0, 1]),           // NC_VERSION unsupported
                (Tag::TEr, vec![0, 1]),           // PLC_VERSION unsupported
                (Tag::SVr, b"OPT1 OPT2".to_vec()), // OPTIONS
                (Tag::TEr, vec![0, 1]),           // ID unsupported
                (Tag::TEr, vec![0, 1]),           // RELEASE_TYPE unsupported
                (Tag::TEr, vec![0, 1]),           // SPLC_VERSION unsupported
            ],
            false,
        );

        let versions = session.get_versions(false).unwrap();
        assert_eq!(versions.control, "iTNC530");
        assert_eq!(versions.options, "OPT1 OPT2");
        assert_eq!(versions.nc_version, "not supported");
        assert_eq!(versions.plc_version, "not supported");
        assert_eq!(versions.id, "not supported");
        assert_eq!(versions.release_type, "not supported");
        assert_eq!(versions.splc_version, "not supported");
    }

    #[test]
    fn get_versions_fails_fatally_when_control_is_missing() {
        let mut session = session_with(vec![(Tag::TEr, vec![0, 1])], false);
        let err = session.get_versions(false).unwrap_err();
        assert!(matches!(err, Error::ControlError { .. }));
    }
}
