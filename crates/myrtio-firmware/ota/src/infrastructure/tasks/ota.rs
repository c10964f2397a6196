use log::{error, info};
use myrtio_ota::OtaError;

use crate::infrastructure::types::OtaController;

/// One update attempt.
///
/// Two instances may be spawned; the second one is turned away by the
/// controller while the first is still downloading.
#[embassy_executor::task(pool_size = 2)]
pub(crate) async fn ota_update_task(ota: &'static OtaController) {
    match ota.run().await {
        Ok(report) => info!(
            "ota: {} bytes installed, reset the board to boot the new image",
            report.bytes_written
        ),
        // Already reported by the controller
        Err(OtaError::AlreadyInProgress) => {}
        Err(err @ OtaError::UpdatePending) => info!("ota: {}", err),
        Err(err) => error!("ota: update failed: {}", err),
    }
}
