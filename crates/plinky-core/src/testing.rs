//! Simulated devices shared by the unit tests.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use crate::{
    codec::{HEADER_LEN, decipher, encode},
    command::Command,
    error::Error,
    response::Response,
    transport::Transport,
};

/// In-memory model of a plug or power strip answering the JSON protocol.
#[derive(Debug, Clone)]
pub(crate) struct SimulatedPlug {
    sysinfo: Value,
    time: Option<Value>,
    ap_list: Option<Value>,
    emeter: Option<Value>,
}

impl SimulatedPlug {
    pub fn single(on: bool) -> Self {
        Self {
            sysinfo: json!({
                "sw_ver": "1.0.10 Build 190103 Rel.163517",
                "hw_ver": "2.0",
                "type": "IOT.SMARTPLUGSWITCH",
                "model": "HS105(US)",
                "mac": "50:C7:BF:00:00:01",
                "alias": "Desk",
                "relay_state": u8::from(on),
                "on_time": 0,
                "feature": "TIM",
                "rssi": -55,
                "led_off": 0,
                "deviceId": "8006000000000000000000000000000000000001",
                "err_code": 0
            }),
            time: None,
            ap_list: None,
            emeter: None,
        }
    }

    pub fn strip(children: &[(&str, u8)]) -> Self {
        let mut plug = Self::single(false);
        plug.sysinfo["model"] = json!("EP40(US)");
        // Power strips leave the top-level state at 0.
        plug.sysinfo["relay_state"] = json!(0);
        plug.sysinfo["children"] = children
            .iter()
            .enumerate()
            .map(|(i, (id, state))| {
                json!({"id": id, "state": state, "alias": format!("Socket {i}"), "on_time": 0})
            })
            .collect();
        plug
    }

    pub fn with_time(mut self, time: Value) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_ap_list(mut self, ap_list: Value) -> Self {
        self.ap_list = Some(ap_list);
        self
    }

    pub fn with_emeter(mut self, reading: Value) -> Self {
        self.emeter = Some(reading);
        self
    }

    pub fn set_alias(&mut self, alias: &str) {
        self.sysinfo["alias"] = json!(alias);
    }

    pub fn sysinfo(&self) -> &Value {
        &self.sysinfo
    }

    /// Builds the reply to one request, applying any state changes.
    pub fn handle(&mut self, request: &Value) -> Value {
        let mut reply = Map::new();
        let ok = json!({"err_code": 0});

        if let Some(system) = request.get("system") {
            let mut out = Map::new();
            if system.get("get_sysinfo").is_some() {
                out.insert("get_sysinfo".into(), self.sysinfo.clone());
            }
            if let Some(params) = system.get("set_relay_state") {
                let state = params["state"].clone();
                match request.pointer("/context/child_ids").and_then(Value::as_array) {
                    Some(ids) => {
                        if let Some(children) = self.sysinfo["children"].as_array_mut() {
                            for child in children.iter_mut() {
                                if ids.contains(&child["id"]) {
                                    child["state"] = state.clone();
                                }
                            }
                        }
                    }
                    None => self.sysinfo["relay_state"] = state,
                }
                out.insert("set_relay_state".into(), ok.clone());
            }
            if let Some(params) = system.get("set_dev_alias") {
                self.sysinfo["alias"] = params["alias"].clone();
                out.insert("set_dev_alias".into(), ok.clone());
            }
            if let Some(params) = system.get("set_led_off") {
                self.sysinfo["led_off"] = params["off"].clone();
                out.insert("set_led_off".into(), ok.clone());
            }
            for key in ["reboot", "reset"] {
                if system.get(key).is_some() {
                    out.insert(key.into(), ok.clone());
                }
            }
            reply.insert("system".into(), Value::Object(out));
        }

        if let Some(time) = request.get("time") {
            let mut out = Map::new();
            if let Some(current) = &self.time {
                for key in ["get_time", "get_timezone"] {
                    if time.get(key).is_some() {
                        out.insert(key.into(), current.clone());
                    }
                }
            }
            if let Some(params) = time.get("set_timezone") {
                self.time = Some(params.clone());
                out.insert("set_timezone".into(), ok.clone());
            }
            if !out.is_empty() {
                reply.insert("time".into(), Value::Object(out));
            }
        }

        if let Some(netif) = request.get("netif") {
            let mut out = Map::new();
            if let (Some(_), Some(ap_list)) = (netif.get("get_scaninfo"), &self.ap_list) {
                out.insert(
                    "get_scaninfo".into(),
                    json!({"ap_list": ap_list, "wpa3_support": 0, "err_code": 0}),
                );
            }
            if netif.get("set_stainfo").is_some() {
                out.insert("set_stainfo".into(), ok.clone());
            }
            reply.insert("netif".into(), Value::Object(out));
        }

        if let Some(emeter) = request.get("emeter") {
            let mut out = Map::new();
            if let Some(reading) = &self.emeter {
                if emeter.get("get_realtime").is_some() {
                    out.insert("get_realtime".into(), reading.clone());
                }
                if emeter.get("erase_emeter_stat").is_some() {
                    let code = reading.get("err_code").cloned().unwrap_or(json!(0));
                    out.insert("erase_emeter_stat".into(), json!({"err_code": code}));
                }
            }
            if !out.is_empty() {
                reply.insert("emeter".into(), Value::Object(out));
            }
        }

        Value::Object(reply)
    }
}

/// Handle to a simulated device listening on TCP.
#[derive(Clone)]
pub(crate) struct DeviceHandle {
    plug: Arc<Mutex<SimulatedPlug>>,
    raw: Arc<Mutex<Vec<String>>>,
}

impl DeviceHandle {
    /// Requests received so far, parsed.
    pub fn requests(&self) -> Vec<Value> {
        self.raw_requests()
            .iter()
            .map(|r| serde_json::from_str(r).unwrap())
            .collect()
    }

    /// Requests received so far, as sent on the wire.
    pub fn raw_requests(&self) -> Vec<String> {
        self.raw.lock().unwrap().clone()
    }

    pub fn sysinfo(&self) -> Value {
        self.plug.lock().unwrap().sysinfo().clone()
    }
}

/// Serves `plug` on `bind` until the test runtime shuts down.
pub(crate) async fn spawn_device(bind: &str, plug: SimulatedPlug) -> (SocketAddr, DeviceHandle) {
    let listener = TcpListener::bind(bind).await.unwrap();
    serve(listener, plug)
}

/// Serves `plug` on an already bound listener.
pub(crate) fn serve(listener: TcpListener, plug: SimulatedPlug) -> (SocketAddr, DeviceHandle) {
    let addr = listener.local_addr().unwrap();
    let handle = DeviceHandle {
        plug: Arc::new(Mutex::new(plug)),
        raw: Arc::new(Mutex::new(Vec::new())),
    };

    let server = handle.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_connection(socket, server.clone()));
        }
    });

    (addr, handle)
}

async fn serve_connection(mut socket: TcpStream, device: DeviceHandle) {
    loop {
        let mut header = [0u8; HEADER_LEN];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let len = u32::from_be_bytes(header) as usize;
        let mut body = vec![0u8; len];
        if socket.read_exact(&mut body).await.is_err() {
            return;
        }

        let text = String::from_utf8(decipher(&body)).unwrap();
        let request: Value = serde_json::from_str(&text).unwrap();
        device.raw.lock().unwrap().push(text);

        let reply = device.plug.lock().unwrap().handle(&request);
        if socket
            .write_all(&encode(reply.to_string().as_bytes()))
            .await
            .is_err()
        {
            return;
        }
    }
}

/// A [`Transport`] backed directly by a [`SimulatedPlug`], recording every
/// command it is asked to send.
pub(crate) struct MockTransport {
    pub plug: SimulatedPlug,
    pub sent: Vec<Value>,
    /// Fail the n-th `set_relay_state` write (0-based) with an I/O error.
    pub fail_relay_write: Option<usize>,
}

impl MockTransport {
    pub fn new(plug: SimulatedPlug) -> Self {
        Self {
            plug,
            sent: Vec::new(),
            fail_relay_write: None,
        }
    }

    /// The `set_relay_state` requests sent so far.
    pub fn relay_writes(&self) -> Vec<&Value> {
        self.sent
            .iter()
            .filter(|r| r.pointer("/system/set_relay_state").is_some())
            .collect()
    }

    /// Child ids targeted by each `set_relay_state` request.
    pub fn relay_write_targets(&self) -> Vec<Vec<String>> {
        self.relay_writes()
            .iter()
            .map(|r| {
                r.pointer("/context/child_ids")
                    .and_then(Value::as_array)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| id.as_str().map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exchange(&mut self, command: &Command) -> Result<Response, Error> {
        let request = serde_json::to_value(command)?;
        let is_relay_write = request.pointer("/system/set_relay_state").is_some();
        let writes_before = self.relay_writes().len();
        self.sent.push(request.clone());

        if is_relay_write && self.fail_relay_write == Some(writes_before) {
            return Err(Error::Io("connection reset by peer".into()));
        }

        let reply = self.plug.handle(&request);
        serde_json::from_value(reply).map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    fn target(&self) -> &str {
        "mock:9999"
    }
}

/// A [`Transport`] that answers every exchange with the same reply.
pub(crate) struct CannedTransport {
    pub reply: Value,
    pub sent: Vec<Value>,
}

impl CannedTransport {
    pub fn new(reply: Value) -> Self {
        Self {
            reply,
            sent: Vec::new(),
        }
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn exchange(&mut self, command: &Command) -> Result<Response, Error> {
        self.sent.push(serde_json::to_value(command)?);
        serde_json::from_value(self.reply.clone())
            .map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    fn target(&self) -> &str {
        "canned:9999"
    }
}
