//! Full bring-up walkthrough against simulated drivers.
//!
//! Runs the client stack on a host with no hardware: a radio that
//! associates a few ticks after `connect`, a broker that accepts the
//! session and answers a command subscription with one scripted command,
//! and a token source that grants immediately. Prints every driver call
//! so the tick-by-tick behavior is visible.

use std::cell::Cell;
use std::collections::VecDeque;

use heapless::{String, Vec};
use libuplink::client::{Client, ClientOptions};
use libuplink::link::{ApConfig, LinkStatus, MAX_SCAN_ENTRIES, Radio, ScanEntry};
use libuplink::platform::{DeviceIdentity, MAX_CHIP_ID_LEN, Platform};
use libuplink::session::token::{AccessToken, TokenRequest, TokenSource};
use libuplink::session::{Broker, ConnectOptions, InboundMessage, QoS};
use libuplink::time::{Clock, Duration, Instant};

/// Millisecond counter advanced by the simulation loop.
#[derive(Default)]
struct SimClock {
    millis: Cell<u32>,
}

impl SimClock {
    fn advance(&self, by: Duration) {
        self.millis.set(self.millis.get().wrapping_add(by.as_millis()));
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.millis.get())
    }
}

/// Radio that completes an association three ticks after `connect`.
struct SimRadio {
    status: LinkStatus,
    countdown: u8,
}

impl SimRadio {
    fn new() -> Self {
        SimRadio {
            status: LinkStatus::Idle,
            countdown: 0,
        }
    }

    fn step(&mut self) {
        if self.status == LinkStatus::Connecting {
            self.countdown -= 1;
            if self.countdown == 0 {
                println!("[radio]    associated, address acquired");
                self.status = LinkStatus::Connected;
            }
        }
    }
}

impl Radio for SimRadio {
    type Error = core::convert::Infallible;

    fn connect(&mut self, ssid: &str, _passphrase: &str) -> Result<(), Self::Error> {
        println!("[radio]    associating with \"{ssid}\"");
        self.status = LinkStatus::Connecting;
        self.countdown = 3;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.status = LinkStatus::Idle;
        Ok(())
    }

    fn forget_credentials(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        self.status
    }

    fn scan(&mut self, _out: &mut Vec<ScanEntry, MAX_SCAN_ENTRIES>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn start_access_point(&mut self, _config: &ApConfig) -> Result<(), Self::Error> {
        Ok(())
    }

    fn stop_access_point(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn access_point_clients(&self) -> usize {
        0
    }

    fn set_hostname(&mut self, hostname: &str) -> Result<(), Self::Error> {
        println!("[radio]    hostname set to \"{hostname}\"");
        Ok(())
    }
}

/// Broker that accepts the session and scripts one command per command
/// subscription.
struct SimBroker {
    connected: bool,
    inbound: VecDeque<InboundMessage>,
}

impl SimBroker {
    fn new() -> Self {
        SimBroker {
            connected: false,
            inbound: VecDeque::new(),
        }
    }
}

impl Broker for SimBroker {
    type Error = &'static str;

    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), Self::Error> {
        println!(
            "[broker]   session open, client id \"{}\", token \"{}\"",
            options.client_id, options.username
        );
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], _retain: bool) -> Result<(), Self::Error> {
        let text = core::str::from_utf8(payload).unwrap_or("<binary>");
        println!("[broker]   publish to \"{topic}\": {text}");
        Ok(())
    }

    fn subscribe(&mut self, pattern: &str, _qos: QoS) -> Result<(), Self::Error> {
        println!("[broker]   subscribed to \"{pattern}\"");
        if pattern.starts_with("command/send") {
            self.inbound.push_back(InboundMessage {
                topic: String::try_from("command/send/1001").unwrap(),
                payload: Vec::from_slice(br#"{"method":"setLed","params":{"on":true}}"#).unwrap(),
            });
        }
        Ok(())
    }

    fn unsubscribe(&mut self, _pattern: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }
}

/// Token source that grants on the first exchange.
struct SimTokens;

impl TokenSource for SimTokens {
    type Error = &'static str;

    fn fetch(
        &mut self,
        endpoint: &str,
        _project_key: &str,
        request: &TokenRequest<'_>,
    ) -> Result<AccessToken, Self::Error> {
        println!(
            "[api]      token granted for \"{}\" via {endpoint}",
            request.device_key
        );
        Ok(AccessToken::try_from("sim-access-token").unwrap())
    }
}

struct SimPlatform;

impl Platform for SimPlatform {
    fn restart(&mut self) {
        println!("[platform] restart requested");
    }
}

struct SimIdentity;

impl DeviceIdentity for SimIdentity {
    fn chip_id(&self) -> String<MAX_CHIP_ID_LEN> {
        String::try_from("8CCE4EA1F00D").unwrap()
    }
}

fn main() {
    let identity = SimIdentity;
    let options = ClientOptions {
        project_key: "pk_demo",
        api_endpoint: "https://api.demo.example",
        ..ClientOptions::default()
    };
    let mut client = Client::new(&identity, &options).expect("options fit their fields");
    client
        .set_wifi_credentials("demo-net", "hunter22!")
        .expect("credentials fit their fields");
    client.on_link_connected(|| println!("[client]   link up"));
    client.on_connected(|| println!("[client]   connected to the platform"));
    client.on_disconnected(|| println!("[client]   disconnected from the platform"));

    let clock = SimClock::default();
    let mut radio = SimRadio::new();
    let mut broker = SimBroker::new();
    let mut tokens = SimTokens;
    let mut platform = SimPlatform;

    println!("device \"{}\" starting", client.client_id());
    client.start(clock.now());

    let mut reported = false;
    for _ in 0..60 {
        clock.advance(Duration::from_millis(100));
        let now = clock.now();
        radio.step();
        client.tick(now, &mut radio, &mut broker, &mut tokens, &mut platform);

        if client.is_connected() && !reported {
            reported = true;
            client.on_command_send(&mut broker, |topic, json| {
                println!("[client]   command on \"{topic}\": {json}")
            });
            client.report_attributes(&mut broker, r#"{"firmware":"1.0.0","demo":true}"#);
            client.report_event(&mut broker, "boot", r#"{"reason":"demo"}"#);
            client.execute_delayed(now, Duration::from_millis(500), || {
                println!("[client]   delayed task ran")
            });
        }
    }

    println!(
        "done, sessions established: {}",
        client.connection_established_count()
    );
}
