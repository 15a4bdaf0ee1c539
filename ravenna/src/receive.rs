use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use structopt::StructOpt;

use ravenna_core::audio::{AudioBuffer, AudioFormat, CircularAudioBuffer};
use ravenna_core::containers::fifo::Single;
use ravenna_core::math::SlidingAverage;
use ravenna_core::util::{Id, SequenceNumber};
use ravenna_rtp::{Filter, PacketBuffer, PacketView, Receiver, Session, DEFAULT_QUEUE_CAPACITY};
use ravenna_sdp::SessionDescription;

use crate::thread;
use crate::RunError;

#[derive(StructOpt, Debug)]
pub struct ReceiveOpt {
    /// Path to the SDP file describing the streams to receive.
    #[structopt(long, name = "file")]
    pub sdp: PathBuf,

    /// Interface addresses to receive on.
    #[structopt(long, name = "addr", env = "RAVENNA_INTERFACE", default_value = "0.0.0.0")]
    pub interface_addr: Vec<Ipv4Addr>,
}

pub fn run(opt: ReceiveOpt) -> Result<(), RunError> {
    let sdp_text = std::fs::read_to_string(&opt.sdp).map_err(RunError::Io)?;
    let session = SessionDescription::parse(&sdp_text).map_err(RunError::Sdp)?;
    session.validate().map_err(RunError::Sdp)?;

    let (sessions, filters) = sessions_from_sdp(&session)?;
    let audio_format = audio_format_from_sdp(&session);

    log::info!(
        "receiving '{}': {} session(s), {} source filter(s)",
        session.session_name,
        sessions.len(),
        filters.len(),
    );

    let mut receiver = Receiver::new();
    let handle = receiver
        .add_reader(Id::generate(), sessions, filters, &opt.interface_addr, DEFAULT_QUEUE_CAPACITY)
        .map_err(RunError::Listen)?;

    std::thread::spawn(move || consume(handle, audio_format));

    loop {
        receiver.poll_once(Duration::from_secs(1)).map_err(RunError::Io)?;
    }
}

/// Maps the SDP media sections onto receiver sessions and source filters.
fn sessions_from_sdp(
    session: &SessionDescription,
) -> Result<(Vec<Session>, Vec<Filter>), RunError> {
    let mut sessions = Vec::new();
    let mut filters = Vec::new();

    for media in &session.media {
        if media.media_type != "audio" {
            log::warn!("skipping non-audio media section '{}'", media.media_type);
            continue;
        }

        let connection = media
            .connections
            .first()
            .or(session.connection.as_ref())
            .ok_or_else(|| RunError::Sdp("no connection address for media section".to_string()))?;

        let multicast_address: Ipv4Addr = connection
            .address
            .parse()
            .map_err(|_| RunError::Sdp(format!("invalid connection address: {}", connection.address)))?;

        sessions.push(Session {
            multicast_address,
            rtp_port: media.port,
            rtcp_port: media.port + 1,
        });

        for filter in session.source_filters.iter().chain(&media.source_filters) {
            for source in &filter.src_list {
                let source_address: Ipv4Addr = source
                    .parse()
                    .map_err(|_| RunError::Sdp(format!("invalid source filter address: {source}")))?;
                filters.push(Filter { source_address });
            }
        }
    }

    if sessions.is_empty() {
        return Err(RunError::Sdp("no audio media sections in sdp".to_string()));
    }

    Ok((sessions, filters))
}

/// The wire audio format of the first audio section, when its rtpmap names
/// a linear PCM payload.
fn audio_format_from_sdp(session: &SessionDescription) -> Option<AudioFormat> {
    for media in &session.media {
        for format in &media.formats {
            if let Some(audio_format) = AudioFormat::from_encoding_name(
                &format.encoding_name,
                format.clock_rate,
                format.num_channels,
            ) {
                log::info!(
                    "payload {}: {} ch {} Hz {}",
                    format.payload_type,
                    audio_format.num_channels,
                    audio_format.sample_rate,
                    format.encoding_name,
                );
                return Some(audio_format);
            }
        }
    }

    log::warn!("no linear pcm payload in sdp, passing packets through undecoded");
    None
}

/// Drains the reader queue, watching stream continuity and feeding decoded
/// audio through a circular buffer.
fn consume(mut handle: ravenna_rtp::ReaderHandle, audio_format: Option<AudioFormat>) {
    thread::set_name("rtp-consume");
    thread::set_realtime_priority();

    // a tenth of a second of buffered audio, then drained in blocks
    let mut audio: Option<(CircularAudioBuffer<f32, Single>, AudioBuffer<f32>)> =
        audio_format.map(|format| {
            let frames = (format.sample_rate / 10).max(1) as usize;
            (
                CircularAudioBuffer::new(format.num_channels as usize, frames),
                AudioBuffer::with_size(format.num_channels as usize, frames / 2),
            )
        });

    let mut buffer = PacketBuffer::default();
    let mut sequence: Option<SequenceNumber<u16>> = None;
    let mut queue_depth = SlidingAverage::<64>::new();
    let mut received: u64 = 0;
    let mut lost: u64 = 0;

    loop {
        if !handle.pop(&mut buffer) {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }

        let packet = match PacketView::new(buffer.as_bytes()) {
            Ok(packet) => packet,
            Err(e) => {
                log::debug!("undecodable rtp packet: {e}");
                continue;
            }
        };

        received += 1;
        queue_depth.observe(handle.queued() as f64);

        match &mut sequence {
            None => sequence = Some(SequenceNumber::new(packet.sequence_number())),
            Some(sequence) => {
                let delta = sequence.update(packet.sequence_number());
                if delta > 1 {
                    lost += u64::from(delta) - 1;
                    log::warn!("{} packet(s) lost before seq={}", delta - 1, packet.sequence_number());
                }
            }
        }

        if let (Some(format), Some((circular, scratch))) = (&audio_format, &mut audio) {
            buffer_audio(format, circular, scratch, packet.payload());
        }

        if received % 10_000 == 0 {
            log::info!(
                "received={received} lost={lost} dropped={} avg_queued={:.1} pt={} ts={}",
                handle.dropped(),
                queue_depth.average().unwrap_or(0.0),
                packet.payload_type(),
                packet.timestamp(),
            );
        }
    }
}

/// Converts one packet's payload into the circular buffer, draining half
/// a buffer at a time once enough frames are queued.
fn buffer_audio(
    format: &AudioFormat,
    circular: &mut CircularAudioBuffer<f32, Single>,
    scratch: &mut AudioBuffer<f32>,
    payload: &[u8],
) {
    let frame_size = format.frame_size();
    if frame_size == 0 || payload.len() % frame_size != 0 {
        log::debug!("payload of {} bytes is not whole frames", payload.len());
        return;
    }

    let num_frames = payload.len() / frame_size;
    match circular.write_converting(
        payload,
        format.sample_format,
        format.byte_order,
        format.interleaving,
        num_frames,
    ) {
        Ok(true) => {}
        Ok(false) => log::debug!("audio buffer full, dropping {num_frames} frames"),
        Err(e) => log::warn!("audio conversion failed: {e}"),
    }

    // a sink would consume here; drain to keep the buffer level bounded
    while circular.len() >= scratch.num_frames() {
        if !circular.read(scratch) {
            break;
        }
    }
}
