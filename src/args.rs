use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
/// Keep a medication schedule and send it to the pill dispenser
pub struct TopLevelCmd {
    /// specify config file path, creates file if it doesn't exist
    #[argh(option, short = 'c')]
    pub config_override: Option<PathBuf>,
    /// config file must exist, including "config_override" files
    #[argh(switch, short = 'r')]
    pub config_required: bool,
    /// use config file as-is (don't save over it)
    #[argh(switch, short = 'n')]
    pub no_save: bool,
    /// medication list file to use instead of the configured one
    #[argh(option, short = 's')]
    pub store_override: Option<PathBuf>,
    #[argh(subcommand)]
    pub subcommands: SubCommands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum SubCommands {
    List(ListCmd),
    Add(AddCmd),
    Remove(RemoveCmd),
    Clear(ClearCmd),
    Import(ImportCmd),
    Qr(QrCmd),
    Scan(ScanCmd),
    Send(SendCmd),
    Payload(PayloadCmd),
}

/// show the medications that will be sent
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "list")]
pub struct ListCmd {}

/// add a medication by hand, replacing whatever is in that tube
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "add")]
pub struct AddCmd {
    /// tube label, e.g. "tube1"
    #[argh(option, short = 't')]
    pub tube: String,
    /// medication name
    #[argh(option, short = 'm')]
    pub name: String,
    /// number of tablets loaded
    #[argh(option, short = 'a')]
    pub amount: String,
    /// schedule entry as HH:MM=dosage, repeatable
    #[argh(option, short = 'd')]
    pub dose: Vec<String>,
}

/// remove a medication by its position in `list`
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "remove")]
pub struct RemoveCmd {
    /// position as shown by `list` (starting at 1)
    #[argh(positional)]
    pub position: usize,
}

/// remove every medication
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "clear")]
pub struct ClearCmd {}

/// replace the medication list with a JSON file
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "import")]
pub struct ImportCmd {
    /// JSON file holding an array of medications
    #[argh(positional)]
    pub file: PathBuf,
}

/// add medications from scanned QR code text (one code per file, "-" for stdin)
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "qr")]
pub struct QrCmd {
    /// files holding the decoded QR text
    #[argh(positional)]
    pub codes: Vec<PathBuf>,
    /// only report which lines are valid, don't change the list
    #[argh(switch)]
    pub check: bool,
}

/// scan for nearby BLE devices
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "scan")]
pub struct ScanCmd {
    /// scan duration in seconds, otherwise uses config's timeout
    #[argh(option, short = 't')]
    pub timeout: Option<u64>,
}

/// send the medication list to the dispenser
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "send")]
pub struct SendCmd {
    /// device name or address, otherwise uses the saved device or the first dispenser found
    #[argh(option, short = 'd')]
    pub device: Option<String>,
    /// save the chosen device to the config
    #[argh(switch)]
    pub remember: bool,
    /// run the whole transfer against a local receiver instead of Bluetooth
    #[argh(switch)]
    pub dry_run: bool,
}

/// print the framed payload exactly as it goes over the air
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "payload")]
pub struct PayloadCmd {}
