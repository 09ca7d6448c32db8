use std::{io, sync::Arc};

use crate::{
    queue::SignQueue,
    settings::Settings,
    signing::SigningService,
    util::tempfiles::TempFileProvider,
};

pub type Services = Arc<ServiceCollection>;

pub struct ServiceCollection {
    pub settings: Settings,
    pub uploads: TempFileProvider,
    pub signing_service: Arc<SigningService>,
    pub queue: Arc<SignQueue>,
}

impl ServiceCollection {
    pub async fn build(settings: Settings) -> io::Result<Services> {
        let signing_service = Arc::new(SigningService::with_command(settings.signer.clone(), settings.dry_run));
        Self::build_with(settings, signing_service).await
    }

    pub async fn build_with(settings: Settings, signing_service: Arc<SigningService>) -> io::Result<Services> {
        let uploads = TempFileProvider::build(&settings.upload_dir).await?;
        let queue = SignQueue::new(signing_service.clone());
        Ok(Arc::new(ServiceCollection {
            settings,
            uploads,
            signing_service,
            queue,
        }))
    }
}
