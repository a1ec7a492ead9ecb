use std::io::Read;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::args::{AddCmd, QrCmd, ScanCmd, SendCmd, SubCommands, TopLevelCmd};
use crate::dispenser::DispenserLink;
use crate::errors::AppError;
use crate::medication::{ManualEntry, Medication};
use crate::payload;
use crate::qr::{self, QrBatch, QrReport};
use crate::scan::{bluetooth_scan, first_adapter, ScanUpdate};
use crate::settings::Settings;
use crate::store::{import_file, MedicationStore};
use crate::structs::{select_device, DeviceInfo};
use crate::transmit::{transmit, DryRunWriter, Pacing, TransmitUpdate};

pub struct App {
    pub settings: Settings,
    pub config_path: PathBuf,
    pub store: MedicationStore,
    pub cancel_app: CancellationToken,
    no_save: bool,
}

impl App {
    pub fn build(
        arg_config: &TopLevelCmd,
        parent_token: Option<CancellationToken>,
    ) -> Result<Self, AppError> {
        let config_path = arg_config
            .config_override
            .clone()
            .unwrap_or_else(default_config_path);
        let settings = Settings::load(&config_path, arg_config.config_required)?;
        let store_path = arg_config
            .store_override
            .clone()
            .unwrap_or_else(|| settings.misc.store_path.clone());
        let store = MedicationStore::open(store_path);
        let cancel_app = parent_token
            .map(|token| token.child_token())
            .unwrap_or_default();

        Ok(Self {
            settings,
            config_path,
            store,
            cancel_app,
            no_save: arg_config.no_save,
        })
    }

    pub fn save_settings(&self) -> Result<(), AppError> {
        if self.no_save {
            return Ok(());
        }
        self.settings.save(&self.config_path)
    }

    pub async fn run_command(&mut self, command: &SubCommands) -> Result<(), AppError> {
        match command {
            SubCommands::List(_) => self.print_list(),
            SubCommands::Add(cmd) => {
                let medication = self.add_manual(cmd)?;
                println!(
                    "Saved {} in {}: {}",
                    medication.name,
                    medication.tube,
                    medication.schedule_summary()
                );
            }
            SubCommands::Remove(cmd) => {
                let Some(index) = cmd.position.checked_sub(1) else {
                    return Err(AppError::NoSuchMedication {
                        index: 0,
                        len: self.store.len(),
                    });
                };
                let removed = self.store.remove(index)?;
                println!("Removed {} from {}", removed.name, removed.tube);
            }
            SubCommands::Clear(_) => {
                self.store.clear()?;
                println!("Cleared all medications");
            }
            SubCommands::Import(cmd) => {
                let count = self.import_json(&cmd.file)?;
                println!("Loaded {count} medications from file");
            }
            SubCommands::Qr(cmd) => self.qr(cmd)?,
            SubCommands::Scan(cmd) => self.scan(cmd).await?,
            SubCommands::Send(cmd) => self.send(cmd).await?,
            SubCommands::Payload(_) => {
                let payload = self.payload()?;
                let chunks = payload::chunk_count(payload.len(), self.settings.transmit.chunk_size);
                println!("{}", String::from_utf8_lossy(&payload));
                println!(
                    "{} bytes, {chunks} chunks of {}",
                    payload.len(),
                    self.settings.transmit.chunk_size
                );
            }
        }
        Ok(())
    }

    fn print_list(&self) {
        if self.store.is_empty() {
            println!("No medications configured");
            return;
        }
        let summary = self.store.summary();
        println!(
            "{} medications, {} tubes, {} schedules",
            summary.medications, summary.tubes, summary.schedules
        );
        for (index, medication) in self.store.medications().iter().enumerate() {
            println!(
                "{:>3}. {:<8} {} x{} | {}",
                index + 1,
                medication.tube,
                medication.name,
                medication.amount,
                medication.schedule_summary()
            );
        }
    }

    pub fn add_manual(&mut self, cmd: &AddCmd) -> Result<Medication, AppError> {
        let entry = ManualEntry {
            tube: cmd.tube.clone(),
            name: cmd.name.clone(),
            amount: cmd.amount.clone(),
            schedules: cmd.dose.clone(),
        };
        let medication = entry.build()?;
        self.store.add(medication.clone())?;
        Ok(medication)
    }

    /// Replaces the list with the contents of a JSON file.
    pub fn import_json(&mut self, path: &Path) -> Result<usize, AppError> {
        let medications = import_file(path).inspect_err(|e| {
            error!("Failed to load JSON file: {e}");
        })?;
        let count = medications.len();
        self.store.replace_all(medications)?;
        info!("Imported {count} medications from {}", path.display());
        Ok(count)
    }

    /// Parses scanned codes and adds every valid line to the list.
    pub fn import_qr_codes<S: AsRef<str>>(&mut self, raw_codes: &[S]) -> Result<QrBatch, AppError> {
        let batch = qr::parse_codes(raw_codes, &self.settings.qr.options());
        if !batch.medications.is_empty() {
            self.store.extend(batch.medications.clone())?;
        }
        Ok(batch)
    }

    pub fn validate_qr_codes<S: AsRef<str>>(&self, raw_codes: &[S]) -> QrReport {
        qr::validate(raw_codes, &self.settings.qr.options())
    }

    fn qr(&mut self, cmd: &QrCmd) -> Result<(), AppError> {
        let raw_codes = read_codes(&cmd.codes)?;
        if cmd.check {
            let report = self.validate_qr_codes(&raw_codes);
            for line in &report.valid {
                println!("ok       {line}");
            }
            for rejected in &report.invalid {
                println!("invalid  {} ({})", rejected.line, rejected.reason);
            }
            println!(
                "{} lines: {} valid, {} invalid",
                report.total_lines(),
                report.valid.len(),
                report.invalid.len()
            );
            return Ok(());
        }
        let batch = self.import_qr_codes(&raw_codes)?;
        for medication in &batch.medications {
            println!(
                "{}: {} x{} | {}",
                medication.tube,
                medication.name,
                medication.amount,
                medication.schedule_summary()
            );
        }
        println!(
            "Parsed {} valid medications out of {} lines",
            batch.medications.len(),
            batch.total_lines()
        );
        Ok(())
    }

    /// The framed payload for the current list.
    pub fn payload(&self) -> Result<Vec<u8>, AppError> {
        if self.store.is_empty() {
            return Err(AppError::NothingToSend);
        }
        Ok(payload::encode(
            self.store.medications(),
            &self.settings.transmit.markers(),
        )?)
    }

    fn pacing(&self) -> Pacing {
        Pacing {
            chunk_size: self.settings.transmit.chunk_size,
            chunk_delay: self.settings.transmit.chunk_delay(),
        }
    }

    async fn discover(&self, timeout_secs: Option<u64>) -> Result<Vec<DeviceInfo>, AppError> {
        let duration = timeout_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| self.settings.ble.scan_timeout());
        let central = first_adapter().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_scan_updates(rx));
        let result = bluetooth_scan(&central, duration, &tx, &self.cancel_app).await;
        drop(tx);
        join_printer(printer).await;
        result
    }

    async fn scan(&self, cmd: &ScanCmd) -> Result<(), AppError> {
        let devices = self.discover(cmd.timeout).await?;
        let service = self.settings.ble.service()?;
        for device in &devices {
            let marker = if device.advertises(&service) { "*" } else { " " };
            let rssi = device
                .rssi
                .map_or_else(|| "n/a".to_string(), |rssi| format!("{rssi} dBm"));
            println!("{marker} {:<24} {:<20} {rssi}", device.name, device.address);
        }
        Ok(())
    }

    async fn send(&mut self, cmd: &SendCmd) -> Result<(), AppError> {
        let payload = self.payload()?;
        if cmd.dry_run {
            return self.send_dry_run(&payload).await;
        }

        let service = self.settings.ble.service()?;
        let characteristic = self.settings.ble.characteristic()?;
        let devices = self.discover(None).await?;
        let selector = cmd
            .device
            .clone()
            .or_else(|| self.settings.ble.saved_selector().map(str::to_owned));
        let device = select_device(&devices, selector.as_deref(), &service).ok_or_else(|| {
            match &selector {
                Some(selector) => AppError::DeviceNotFound(selector.clone()),
                None => AppError::NoDeviceSelected,
            }
        })?;
        println!("Connecting to {}...", device.name);

        let mut link = match DispenserLink::connect(
            device,
            service,
            characteristic,
            self.settings.ble.connect_timeout(),
            self.settings.transmit.with_response,
        )
        .await
        {
            Ok(link) => link,
            Err(e) => {
                warn!("Connection failed, resetting connection state: {e}");
                return Err(e);
            }
        };
        println!("Connected to {}", link.name());

        if cmd.remember {
            self.settings.ble.saved_name = device.name.clone();
            self.settings.ble.saved_address = device.address.clone();
            self.save_settings()?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_transmit_updates(rx));
        let result = transmit(&mut link, &payload, self.pacing(), &tx, &self.cancel_app).await;
        drop(tx);
        join_printer(printer).await;

        if let Err(e) = link.disconnect().await {
            warn!("Failed to disconnect cleanly: {e}");
        }
        match result {
            Ok(_) => {
                println!("Configuration sent successfully!");
                Ok(())
            }
            Err(e) => {
                if e.is_connection_error() {
                    warn!("Lost the dispenser mid-transfer: {e}");
                }
                Err(e)
            }
        }
    }

    /// Runs the transfer against a [`DryRunWriter`] and checks the result decodes
    /// back to the stored list.
    pub async fn send_dry_run(&self, payload: &[u8]) -> Result<(), AppError> {
        let markers = self.settings.transmit.markers();
        let mut writer = DryRunWriter::new(markers, self.settings.transmit.chunk_size);
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_transmit_updates(rx));
        let result = transmit(&mut writer, payload, self.pacing(), &tx, &self.cancel_app).await;
        drop(tx);
        join_printer(printer).await;
        result?;

        let reassembler = writer.into_reassembler();
        let received = reassembler.finish()?;
        if received != self.store.medications() {
            return Err(AppError::DryRunMismatch(format!(
                "sent {} medications, decoded {}",
                self.store.len(),
                received.len()
            )));
        }
        println!(
            "Configuration sent successfully! (dry run, {} chunks)",
            reassembler.chunks_received()
        );
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_PKG_NAME"), ".toml"))
}

/// Each file is one scanned code. No files, or "-", reads stdin.
fn read_codes(paths: &[PathBuf]) -> Result<Vec<String>, AppError> {
    let read_stdin = || -> Result<String, AppError> {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    };
    if paths.is_empty() {
        return Ok(vec![read_stdin()?]);
    }
    paths
        .iter()
        .map(|path| {
            if path.as_os_str() == "-" {
                read_stdin()
            } else {
                std::fs::read_to_string(path).map_err(|e| AppError::ReadFile {
                    path: path.clone(),
                    source: e,
                })
            }
        })
        .collect()
}

async fn join_printer(printer: JoinHandle<()>) {
    if let Err(e) = printer.await {
        warn!("Progress printer stopped unexpectedly: {e}");
    }
}

async fn print_scan_updates(mut rx: UnboundedReceiver<ScanUpdate>) {
    while let Some(update) = rx.recv().await {
        println!("{}", update.status_message());
    }
}

async fn print_transmit_updates(mut rx: UnboundedReceiver<TransmitUpdate>) {
    while let Some(update) = rx.recv().await {
        match update {
            TransmitUpdate::Preparing { total_chunks } => {
                println!("Preparing data transmission ({total_chunks} chunks)...")
            }
            TransmitUpdate::ChunkSent { sent, total } => {
                println!(
                    "Sending chunk {sent}/{total} ({:.0}%)",
                    update.progress() * 100.0
                )
            }
            TransmitUpdate::Complete { bytes } => println!("Transmission complete ({bytes} bytes)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn panicked_printer_is_only_logged() {
        let printer = tokio::spawn(async { panic!("stdout closed") });
        join_printer(printer).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_transmit_updates(rx));
        tx.send(TransmitUpdate::Complete { bytes: 7 }).unwrap();
        drop(tx);
        join_printer(printer).await;
    }
}
