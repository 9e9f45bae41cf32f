use super::{Engine, Event, RideView, RouteSynchronizer, SessionHandle, ViewSnapshot, ViewTask};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{
    api::ViewAPI,
    entities::SelectionEvent,
    error::{invalid_input_error, invalid_state_error, unexpected_error, Error},
    surface::AttachmentPoint,
};

#[async_trait]
impl ViewAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_view(&self) -> Result<Uuid, Error> {
        let id = Uuid::new_v4();
        let (events, queue) = async_channel::unbounded();

        let synchronizer = RouteSynchronizer::new(
            self.routing.clone(),
            self.config.route_profile,
            self.config.style.fit_padding,
            self.config.route_timeout,
            events.clone(),
        );

        let view = RideView::new(
            id,
            self.directory.clone(),
            self.config.style.clone(),
            Box::new(self.surface.clone()),
            synchronizer,
            events.clone(),
        );

        let task = tokio::spawn(view.run(queue));

        self.views.lock().await.insert(
            id,
            ViewTask {
                events,
                task,
                element: None,
            },
        );

        tracing::info!("created view {}", id);

        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    async fn find_view(&self, id: Uuid) -> Result<ViewSnapshot, Error> {
        let (reply, snapshot) = oneshot::channel();
        self.send(id, Event::Snapshot(reply)).await?;

        snapshot.await.map_err(|_| unexpected_error())
    }

    #[tracing::instrument(skip(self))]
    async fn mount_view(
        &self,
        id: Uuid,
        attachment: AttachmentPoint,
    ) -> Result<SessionHandle, Error> {
        if attachment.element_id.is_empty() || !(attachment.width > 0.0 && attachment.height > 0.0)
        {
            return Err(invalid_input_error());
        }

        // unknown ids fail before the element is touched
        let events = self.sender(id).await?;
        let element_id = attachment.element_id.clone();

        self.surface.attach(&element_id)?;

        let (reply, handle) = oneshot::channel();
        let sent = events
            .send(Event::Mount {
                attachment,
                reply: Some(reply),
            })
            .await
            .map_err(|_| invalid_state_error());

        let mounted = match sent {
            Ok(()) => handle.await.map_err(|_| unexpected_error()).and_then(|r| r),
            Err(e) => Err(e),
        };

        let mut views = self.views.lock().await;
        let previous = match (&mounted, views.get_mut(&id)) {
            (Ok(_), Some(view)) => view.element.replace(element_id.clone()),
            _ => None,
        };

        if let Some(previous) = previous.filter(|p| *p != element_id) {
            self.release_element(&views, &previous);
        }
        if mounted.is_err() {
            self.release_element(&views, &element_id);
        }

        mounted
    }

    #[tracing::instrument(skip(self))]
    async fn unmount_view(&self, id: Uuid) -> Result<(), Error> {
        self.send(id, Event::Unmount).await?;
        // the snapshot is answered after the unmount went through
        self.find_view(id).await?;

        let mut views = self.views.lock().await;
        let element = views.get_mut(&id).and_then(|view| view.element.take());

        if let Some(element) = element {
            self.release_element(&views, &element);
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_selection(&self, id: Uuid, event: SelectionEvent) -> Result<(), Error> {
        self.send(id, Event::Select(event)).await
    }

    #[tracing::instrument(skip(self))]
    async fn destroy_view(&self, id: Uuid) -> Result<(), Error> {
        let view = self
            .views
            .lock()
            .await
            .remove(&id)
            .ok_or_else(invalid_input_error)?;

        let element = view.element.clone();
        let stopped = stop(view).await;

        if let Some(element) = element {
            self.release_element(&*self.views.lock().await, &element);
        }

        stopped
    }

    #[tracing::instrument(skip(self))]
    async fn shutdown(&self) -> Result<(), Error> {
        let views: Vec<ViewTask> = self.views.lock().await.drain().map(|(_, v)| v).collect();
        let elements: Vec<String> = views.iter().filter_map(|v| v.element.clone()).collect();

        tracing::info!("stopping {} views", views.len());

        let stopped = join_all(views.into_iter().map(stop))
            .await
            .into_iter()
            .collect();

        let views = self.views.lock().await;
        for element in elements {
            self.release_element(&views, &element);
        }

        stopped
    }
}

/// Ends the view's loop; the loop closes its session on the way out.
async fn stop(view: ViewTask) -> Result<(), Error> {
    let ViewTask { events, task, .. } = view;

    if events.send(Event::Shutdown).await.is_err() {
        tracing::debug!("view already stopped");
    }

    task.await.map_err(|_| unexpected_error())
}
