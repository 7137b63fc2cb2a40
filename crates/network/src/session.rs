//! # Query Session
//!
//! One query against one server, run as a fixed sequence of phases:
//!
//! 1. **Info** - name, map, player counts, tags; detects split quirks
//! 2. **Challenge** - legacy challenge request, only when configured
//! 3. **Players** - player list (servers may ignore it)
//! 4. **Rules** - rules, plus the DayZ tag state and mod list
//! 5. **Cleanup** - promotes the collected fields into [`ServerInfo`]
//!
//! Each phase waits for its exchange before the next starts. The session
//! owns its state; nothing is shared between sessions.

use squery_core::{AppId, QueryError, Result};
use squery_protocol::{
    decode_mods, filter_mods, Command, PacketReader, ResponseCode, INFO_PROBE,
};
use tracing::{debug, info, instrument};

use crate::config::QueryConfig;
use crate::exchange::Exchanger;
use crate::state::{GoldSrcMod, Player, RawState, ServerInfo};
use crate::tags::DayzTags;
use crate::transport::{Transport, UdpTransport};

/// Extra data flags trailing a Source info reply
mod edf {
    pub const GAME_PORT: u8 = 0x80;
    pub const STEAM_ID: u8 = 0x10;
    pub const SOURCE_TV: u8 = 0x40;
    pub const TAGS: u8 = 0x20;
    pub const GAME_ID: u8 = 0x01;
}

/// Protocol version reported by GoldSrc servers answering Source queries
const GOLDSRC_PROTOCOL: u8 = 48;

/// Protocol version of engines that omit the split size field
const NO_SPLIT_SIZE_PROTOCOL: u8 = 7;

/// A query in progress
pub struct QuerySession<T: Transport> {
    exchanger: Exchanger<T>,
    info: ServerInfo,
    raw: RawState,
}

impl<T: Transport> QuerySession<T> {
    pub fn new(transport: T, config: &QueryConfig) -> Self {
        Self {
            exchanger: Exchanger::new(transport, config),
            info: ServerInfo::default(),
            raw: RawState::default(),
        }
    }

    pub fn exchanger(&self) -> &Exchanger<T> {
        &self.exchanger
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn raw(&self) -> &RawState {
        &self.raw
    }

    /// Run every phase and return the result
    pub async fn run(mut self) -> Result<ServerInfo> {
        self.query_info().await?;
        self.query_challenge().await?;
        self.query_players().await?;
        self.query_rules().await?;
        Ok(self.cleanup())
    }

    /// Info phase
    pub async fn query_info(&mut self) -> Result<()> {
        debug!("Requesting info ...");

        let goldsrc_info = self.exchanger.state().goldsrc_info;
        let expect = if goldsrc_info { ResponseCode::GoldSrcInfo } else { ResponseCode::Info };

        let body = self
            .exchanger
            .send_packet(Command::Info, Some(INFO_PROBE), expect, false)
            .await?
            .ok_or(QueryError::Timeout)?;

        let mut reader = PacketReader::new(body);
        if goldsrc_info {
            self.parse_goldsrc_info(&mut reader)?;
        } else {
            self.parse_source_info(&mut reader)?;
        }

        let state = self.exchanger.state_mut();
        if self.raw.protocol == NO_SPLIT_SIZE_PROTOCOL && self.raw.app_id.omits_split_size() {
            state.skip_size_in_split_header = true;
        }
        if self.raw.protocol == GOLDSRC_PROTOCOL {
            debug!("GoldSrc detected, using the GoldSrc split format");
            state.goldsrc_splits = true;
        }

        debug!(
            protocol = self.raw.protocol,
            app_id = self.raw.app_id.get(),
            folder = %self.raw.folder,
            "Info: {:?}",
            self.info.name
        );
        Ok(())
    }

    fn parse_source_info(&mut self, reader: &mut PacketReader) -> Result<()> {
        self.raw.protocol = reader.read_u8()?;
        self.info.name = reader.read_string()?;
        self.info.map = reader.read_string()?;
        self.raw.folder = reader.read_string()?;
        self.raw.game = reader.read_string()?;
        self.raw.app_id = AppId::from(u32::from(reader.read_u16()?));
        self.raw.num_players = reader.read_u8()?;
        self.info.max_players = reader.read_u8()?;
        self.raw.num_bots = reader.read_u8()?;
        self.raw.server_type = char::from(reader.read_u8()?);
        self.raw.environment = char::from(reader.read_u8()?);
        self.info.password = reader.read_u8()? != 0;
        self.raw.secure = reader.read_u8()? != 0;
        self.raw.version = reader.read_string()?;

        let flags = reader.read_u8()?;
        if flags & edf::GAME_PORT != 0 {
            self.info.game_port = Some(reader.read_u16()?);
        }
        if flags & edf::STEAM_ID != 0 {
            self.raw.steam_id = Some(reader.read_u64()?);
        }
        if flags & edf::SOURCE_TV != 0 {
            self.raw.sourcetv_port = Some(reader.read_u16()?);
            self.raw.sourcetv_name = Some(reader.read_string()?);
        }
        if flags & edf::TAGS != 0 {
            let tags = reader.read_string()?;
            self.raw.tags = tags.split(',').map(str::to_string).collect();
            self.info.tags = self
                .raw
                .tags
                .iter()
                .filter(|tag| !tag.is_empty())
                .cloned()
                .collect();
        }
        if flags & edf::GAME_ID != 0 {
            let game_id = reader.read_u64()?;
            let app_id = (game_id & 0xFF_FFFF) as u32;
            if app_id != 0 {
                self.raw.app_id = AppId::new(app_id);
            }
        }

        Ok(())
    }

    fn parse_goldsrc_info(&mut self, reader: &mut PacketReader) -> Result<()> {
        self.raw.address = Some(reader.read_string()?);
        self.info.name = reader.read_string()?;
        self.info.map = reader.read_string()?;
        self.raw.folder = reader.read_string()?;
        self.raw.game = reader.read_string()?;
        self.raw.app_id = AppId::from(u32::from(reader.read_u16()?));
        self.raw.num_players = reader.read_u8()?;
        self.info.max_players = reader.read_u8()?;
        self.raw.protocol = reader.read_u8()?;
        self.raw.server_type = char::from(reader.read_u8()?);
        self.raw.environment = char::from(reader.read_u8()?);
        self.info.password = reader.read_u8()? != 0;

        if reader.read_u8()? != 0 {
            let link = reader.read_string()?;
            let download = reader.read_string()?;
            reader.skip(1)?;
            self.raw.game_mod = Some(GoldSrcMod {
                link,
                download,
                version: reader.read_u32()?,
                size: reader.read_u32()?,
                mod_type: reader.read_u8()?,
                dll: reader.read_u8()?,
            });
        }

        self.raw.secure = reader.read_u8()? != 0;
        self.raw.num_bots = reader.read_u8()?;
        Ok(())
    }

    /// Legacy challenge phase
    ///
    /// The exchanger stores the key from the reply; a silent server leaves
    /// the session with whatever challenge it already had.
    pub async fn query_challenge(&mut self) -> Result<()> {
        if !self.exchanger.state().legacy_challenge {
            return Ok(());
        }

        debug!("Requesting legacy challenge key ...");
        self.exchanger
            .send_packet(Command::Challenge, None, ResponseCode::Challenge, true)
            .await?;
        Ok(())
    }

    /// Players phase
    pub async fn query_players(&mut self) -> Result<()> {
        self.raw.players.clear();

        debug!("Requesting player list ...");
        let Some(body) = self
            .exchanger
            .send_packet(Command::Players, None, ResponseCode::Players, true)
            .await?
        else {
            // Some servers never answer player queries
            return Ok(());
        };

        let mut reader = PacketReader::new(body);
        let count = reader.read_u8()?;
        for _ in 0..count {
            reader.skip(1)?;
            let name = reader.read_string()?;
            let score = reader.read_i32()?;
            let time = reader.read_f32()?;

            debug!("Found player: {} {} {}", name, score, time);

            // connecting players have no name yet
            if name.is_empty() {
                continue;
            }
            self.raw.players.push(Player { name, score, time });
        }

        Ok(())
    }

    /// Rules phase
    ///
    /// DayZ servers prepend binary chunks to the rule list. Each chunk starts
    /// with two non-zero bytes and a zero; its value bytes up to the next zero
    /// belong to the mod list. The first entry without that shape ends the
    /// chunks and the rest are plain key/value pairs.
    pub async fn query_rules(&mut self) -> Result<()> {
        let is_dayz = self.raw.app_id == AppId::DAYZ;

        if is_dayz && !self.raw.tags.is_empty() {
            self.raw.dayz_tags = Some(DayzTags::parse(&self.raw.tags));
        }

        self.raw.rules.clear();
        self.raw.dayz_mods.clear();

        debug!("Requesting rules ...");
        let Some(body) = self
            .exchanger
            .send_packet(Command::Rules, None, ResponseCode::Rules, true)
            .await?
        else {
            debug!("No rules reply, the server probably has rules disabled");
            return Ok(());
        };

        let mut reader = PacketReader::new(body);
        let count = reader.read_u16()?;

        let mut mod_payload = Vec::new();
        let mut in_chunks = is_dayz;

        for _ in 0..count {
            if in_chunks {
                let one = reader.read_u8()?;
                let two = reader.read_u8()?;
                let three = reader.read_u8()?;

                if one != 0 && two != 0 && three == 0 {
                    loop {
                        let byte = reader.read_u8()?;
                        if byte == 0 {
                            break;
                        }
                        mod_payload.push(byte);
                    }
                    continue;
                }

                reader.skip(-3)?;
                in_chunks = false;
            }

            let key = reader.read_string()?;
            let value = reader.read_string()?;
            self.raw.rules.insert(key, value);
        }

        self.raw.dayz_mods = decode_mods(&mod_payload)?;
        Ok(())
    }

    /// Promote collected fields and drop everything else
    pub fn cleanup(self) -> ServerInfo {
        let Self { mut info, raw, .. } = self;

        info.version = raw.version;
        info.num_players = raw.num_players;

        if let Some(tags) = raw.dayz_tags {
            info.first_person = Some(tags.first_person);
            info.dlc_enabled = Some(tags.dlc_enabled);
            info.private_hive = Some(tags.private_hive);
            info.external = Some(tags.external);
            info.queue = tags.queue;
            info.day_acceleration = tags.day_acceleration;
            info.night_acceleration = tags.night_acceleration;
            info.time = tags.time;
        }

        info.mods = filter_mods(raw.dayz_mods);
        info
    }
}

/// Query one server over UDP
///
/// # Errors
/// - `QueryError::Config` - Invalid configuration or unresolvable host
/// - `QueryError::Timeout` - No info reply, or the whole query ran past `attempt_timeout`
#[instrument(skip(config), fields(server = %config.address()))]
pub async fn query_server(config: &QueryConfig) -> Result<ServerInfo> {
    config.validate().map_err(QueryError::Config)?;

    let addr = UdpTransport::resolve(&config.host, config.port).await?;
    let transport = UdpTransport::connect(addr).await?;
    let session = QuerySession::new(transport, config);

    let result = tokio::time::timeout(config.attempt_timeout, session.run())
        .await
        .map_err(|_| QueryError::Timeout)??;

    info!("Query of {} finished: {:?} ({} mods)", addr, result.name, result.mods.len());
    Ok(result)
}
