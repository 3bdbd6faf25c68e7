//! Parcel layout of the sensor service transactions
//!
//! Every reply starts with the transport status followed by the HAL result
//! code. Fixed-size records (sensor descriptions, events) travel as packed
//! little-endian structs; strings are length-prefixed UTF-8.

use bytemuck::{Pod, Zeroable};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{HalEvent, Result, SensorError, SensorInfo, EVENT_DATA_LEN, SENSORS_EVENT_SIZE};

/// Transaction codes of the sensors interface
pub mod codes {
    pub const GET_SENSORS_LIST: u32 = 1;
    pub const SET_OPERATION_MODE: u32 = 2;
    pub const ACTIVATE: u32 = 3;
    pub const POLL: u32 = 4;
    pub const BATCH: u32 = 5;
}

/// Transport-level OK
pub const STATUS_OK: i32 = 0;

/// Sensor description as laid out on the wire
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WireSensor {
    pub handle: i32,
    pub sensor_type: i32,
    pub max_range: f32,
    pub resolution: f32,
    pub power: f32,
    pub min_delay: i32,
    pub max_delay: i32,
    pub flags: u32,
}

/// Event as laid out on the wire; the step counter overlays `data[0..2]`
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WireEvent {
    pub timestamp: i64,
    pub sensor: i32,
    pub sensor_type: i32,
    pub data: [f32; EVENT_DATA_LEN],
}

const WIRE_SENSOR_SIZE: usize = std::mem::size_of::<WireSensor>();
const WIRE_EVENT_SIZE: usize = std::mem::size_of::<WireEvent>();

impl From<&HalEvent> for WireEvent {
    fn from(e: &HalEvent) -> Self {
        let mut data = e.data;
        if e.step_counter != 0 {
            data[0] = f32::from_bits(e.step_counter as u32);
            data[1] = f32::from_bits((e.step_counter >> 32) as u32);
        }
        Self {
            timestamp: e.timestamp_ns,
            sensor: e.sensor,
            sensor_type: e.sensor_type,
            data,
        }
    }
}

impl From<WireEvent> for HalEvent {
    fn from(w: WireEvent) -> Self {
        let step_counter = u64::from(w.data[0].to_bits()) | (u64::from(w.data[1].to_bits()) << 32);
        Self {
            // The binder layout carries no version; it always matches
            version: SENSORS_EVENT_SIZE,
            sensor: w.sensor,
            sensor_type: w.sensor_type,
            timestamp_ns: w.timestamp,
            data: w.data,
            step_counter,
        }
    }
}

fn need(buf: &impl Buf, n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(SensorError::malformed(format!(
            "{what}: need {n} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_string(buf: &mut Bytes) -> Result<String> {
    need(buf, 4, "string length")?;
    let len = buf.get_u32_le() as usize;
    need(buf, len, "string body")?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|e| SensorError::malformed(e.to_string()))
}

fn get_pod<T: Pod>(buf: &mut Bytes, size: usize, what: &str) -> Result<T> {
    need(buf, size, what)?;
    let raw = buf.split_to(size);
    bytemuck::try_pod_read_unaligned(&raw).map_err(|e| SensorError::malformed(format!("{what}: {e}")))
}

/// Check the two leading status words of a reply
pub fn read_reply_header(buf: &mut Bytes, op: &'static str, handle: i32) -> Result<()> {
    need(buf, 8, "reply header")?;
    let status = buf.get_i32_le();
    let result = buf.get_i32_le();
    if status != STATUS_OK {
        return Err(SensorError::transport(status as u32, format!("{op} reply status {status}")));
    }
    if result != 0 {
        return Err(SensorError::hal(op, handle, result));
    }
    Ok(())
}

fn reply_header(result: i32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_i32_le(STATUS_OK);
    buf.put_i32_le(result);
    buf
}

// ===== Requests =====

pub fn encode_activate(handle: i32, enabled: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_i32_le(handle);
    buf.put_i32_le(i32::from(enabled));
    buf.freeze()
}

pub fn decode_activate(mut buf: Bytes) -> Result<(i32, bool)> {
    need(&buf, 8, "activate request")?;
    Ok((buf.get_i32_le(), buf.get_i32_le() != 0))
}

/// BATCH with zero report latency
pub fn encode_batch(handle: i32, period_ns: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(20);
    buf.put_i32_le(handle);
    buf.put_i64_le(period_ns);
    buf.put_i64_le(0);
    buf.freeze()
}

pub fn decode_batch(mut buf: Bytes) -> Result<(i32, i64)> {
    need(&buf, 20, "batch request")?;
    let handle = buf.get_i32_le();
    let period = buf.get_i64_le();
    let _latency = buf.get_i64_le();
    Ok((handle, period))
}

pub fn encode_poll(max_count: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32_le(max_count);
    buf.freeze()
}

pub fn decode_poll(mut buf: Bytes) -> Result<i32> {
    need(&buf, 4, "poll request")?;
    Ok(buf.get_i32_le())
}

// ===== Replies =====

/// Reply carrying only the result code
pub fn encode_status_reply(result: i32) -> Bytes {
    reply_header(result).freeze()
}

pub fn encode_sensor_list(sensors: &[SensorInfo]) -> Bytes {
    let mut buf = reply_header(0);
    buf.put_u32_le(sensors.len() as u32);
    for s in sensors {
        let wire = WireSensor {
            handle: s.handle,
            sensor_type: s.sensor_type,
            max_range: s.max_range,
            resolution: s.resolution,
            power: s.power_ma,
            min_delay: s.min_delay_us,
            max_delay: s.max_delay_us.unwrap_or(0),
            flags: 0,
        };
        buf.put_slice(bytemuck::bytes_of(&wire));
        put_string(&mut buf, &s.name);
        put_string(&mut buf, &s.vendor);
    }
    buf.freeze()
}

pub fn decode_sensor_list(mut buf: Bytes) -> Result<Vec<SensorInfo>> {
    read_reply_header(&mut buf, "get_sensors_list", -1)?;
    need(&buf, 4, "sensor count")?;
    let count = buf.get_u32_le() as usize;
    let mut sensors = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let wire: WireSensor = get_pod(&mut buf, WIRE_SENSOR_SIZE, "sensor record")?;
        let name = get_string(&mut buf)?;
        let vendor = get_string(&mut buf)?;
        sensors.push(SensorInfo {
            handle: wire.handle,
            sensor_type: wire.sensor_type,
            name,
            vendor,
            max_range: wire.max_range,
            resolution: wire.resolution,
            power_ma: wire.power,
            min_delay_us: wire.min_delay,
            max_delay_us: Some(wire.max_delay),
        });
    }
    Ok(sensors)
}

pub fn encode_events(events: &[HalEvent]) -> Bytes {
    let mut buf = reply_header(0);
    buf.reserve(4 + events.len() * WIRE_EVENT_SIZE);
    buf.put_u32_le(events.len() as u32);
    for e in events {
        buf.put_slice(bytemuck::bytes_of(&WireEvent::from(e)));
    }
    buf.freeze()
}

pub fn decode_events(mut buf: Bytes) -> Result<Vec<HalEvent>> {
    read_reply_header(&mut buf, "poll", -1)?;
    need(&buf, 4, "event count")?;
    let count = buf.get_u32_le() as usize;
    need(&buf, count * WIRE_EVENT_SIZE, "event vector")?;
    (0..count)
        .map(|_| get_pod::<WireEvent>(&mut buf, WIRE_EVENT_SIZE, "event").map(HalEvent::from))
        .collect()
}
